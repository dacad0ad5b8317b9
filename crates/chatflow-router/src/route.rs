use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chatflow_core::handler::RequestHandler;
use chatflow_core::{RequestMapping, Response, Result, UpdateRequest};
use tracing::info;

type RouteFn = dyn Fn(&UpdateRequest) -> Result<Option<Response>> + Send + Sync;

/// A handler bound to a guard.
///
/// Returning `Ok(None)` means "handled, nothing to send".
pub struct Route {
    name: String,
    mapping: RequestMapping,
    required_roles: Vec<String>,
    handler: Box<RouteFn>,
}

impl Route {
    pub fn new<F>(name: impl Into<String>, mapping: RequestMapping, handler: F) -> Self
    where
        F: Fn(&UpdateRequest) -> Result<Option<Response>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            mapping,
            required_roles: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Restrict the route to users holding at least one of `roles`.
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn mapping(&self) -> &RequestMapping {
        &self.mapping
    }
}

impl RequestHandler for Route {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_roles(&self) -> &[String] {
        &self.required_roles
    }

    fn invoke(&self, request: &UpdateRequest) -> Result<Option<Response>> {
        (self.handler)(request)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("mapping", &self.mapping)
            .field("required_roles", &self.required_roles)
            .finish()
    }
}

/// Routes ordered most specific first. Routes of equal specificity keep
/// registration order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Route) -> &mut Self {
        info!(route = %route.name, pattern = route.mapping.pattern(), "route registered");
        self.routes.push(Arc::new(route));
        self.routes
            .sort_by_key(|r| std::cmp::Reverse(r.mapping.specificity()));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The best route for `request` and the variables its pattern captured.
    pub fn resolve(&self, request: &UpdateRequest) -> Option<(Arc<Route>, HashMap<String, String>)> {
        self.routes.iter().find_map(|route| {
            route
                .mapping
                .match_request(request)
                .map(|vars| (Arc::clone(route), vars))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::Update;

    fn noop(name: &str, pattern: &str) -> Route {
        Route::new(name, RequestMapping::text(pattern).unwrap(), |_| Ok(None))
    }

    fn resolve(table: &RouteTable, text: &str) -> Option<String> {
        let request = UpdateRequest::new(Update::message(1, 2, 3, text));
        table.resolve(&request).map(|(r, _)| r.name().to_string())
    }

    #[test]
    fn most_specific_route_wins() {
        let mut table = RouteTable::new();
        table
            .add(noop("fallback", "**"))
            .add(noop("glob", "/start*"))
            .add(noop("exact", "/start"));

        assert_eq!(resolve(&table, "/start").as_deref(), Some("exact"));
        assert_eq!(resolve(&table, "/start now").as_deref(), Some("glob"));
        assert_eq!(resolve(&table, "hi").as_deref(), Some("fallback"));
    }

    #[test]
    fn equal_specificity_keeps_registration_order() {
        let mut table = RouteTable::new();
        table.add(noop("first", "/a {x}")).add(noop("second", "/a {y}"));
        assert_eq!(resolve(&table, "/a 1").as_deref(), Some("first"));
    }

    #[test]
    fn captures_are_returned() {
        let mut table = RouteTable::new();
        table.add(noop("buy", "/buy {item}"));
        let request = UpdateRequest::new(Update::message(1, 2, 3, "/buy tea"));
        let (_, vars) = table.resolve(&request).unwrap();
        assert_eq!(vars["item"], "tea");
    }
}
