use std::sync::Arc;

use chatflow_core::handler::RequestHandler;
use chatflow_core::{Response, Result, UpdateRequest};
use chatflow_filters::PreFilter;
use tracing::{debug, warn};

use crate::route::RouteTable;

/// Resolves the route for the request and stores it, with its captured
/// template variables, on the accessor.
pub struct RoutePopulateFilter {
    table: Arc<RouteTable>,
}

impl RoutePopulateFilter {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }
}

impl PreFilter for RoutePopulateFilter {
    fn name(&self) -> &str {
        "route-populate"
    }

    fn pre_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        if let Some((route, vars)) = self.table.resolve(request) {
            debug!(route = route.name(), "route resolved");
            let accessor = request.accessor_mut();
            accessor.set_handler(route);
            accessor.set_template_variables(vars);
        }
        Ok(())
    }
}

/// Forbids a resolved route to users lacking all of its required roles.
///
/// Applies to every request: the route is only known once
/// [`RoutePopulateFilter`] has run, after the filter list was resolved.
pub struct HasRoleFilter;

impl PreFilter for HasRoleFilter {
    fn name(&self) -> &str {
        "has-role"
    }

    fn pre_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        let Some(handler) = request.accessor().handler().cloned() else {
            return Ok(());
        };
        if handler.required_roles().is_empty() {
            return Ok(());
        }
        if !request.accessor().has_any_role(handler.required_roles()) {
            warn!(
                user_id = request.user_id(),
                route = handler.name(),
                required = ?handler.required_roles(),
                "route forbidden: missing role"
            );
            request.accessor_mut().set_response(Response::Forbidden);
        }
        Ok(())
    }
}
