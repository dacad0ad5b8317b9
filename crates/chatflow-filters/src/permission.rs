//! Role loading and access control.
//!
//! Roles come from an optional [`PermissionAdapter`] first, then from the
//! static `[permission]` config table, then from `default_roles`.

use std::sync::Arc;

use chatflow_core::config::{AccessMode, PermissionConfig};
use chatflow_core::{Response, Result, UpdateRequest};
use tracing::{debug, warn};

use crate::filter::PreFilter;

/// External role store. Treated as a pure lookup.
pub trait PermissionAdapter: Send + Sync {
    /// `None` when the store knows nothing about the user.
    fn roles(&self, user_id: i64) -> Result<Option<Vec<String>>>;
}

/// Loads the user's roles into the accessor.
pub struct RoleFilter {
    adapter: Option<Arc<dyn PermissionAdapter>>,
    config: PermissionConfig,
}

impl RoleFilter {
    pub fn new(adapter: Option<Arc<dyn PermissionAdapter>>, config: PermissionConfig) -> Self {
        Self { adapter, config }
    }

    fn resolve(&self, user_id: i64) -> Result<Vec<String>> {
        if let Some(adapter) = &self.adapter {
            if let Some(roles) = adapter.roles(user_id)? {
                return Ok(roles);
            }
        }
        Ok(self
            .config
            .assignments
            .get(&user_id.to_string())
            .cloned()
            .unwrap_or_else(|| self.config.default_roles.clone()))
    }
}

impl PreFilter for RoleFilter {
    fn name(&self) -> &str {
        "role"
    }

    fn pre_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        let roles = self.resolve(request.user_id())?;
        debug!(user_id = request.user_id(), ?roles, "roles loaded");
        request.accessor_mut().set_roles(roles);
        Ok(())
    }
}

/// Denies users without any role when access is restricted to roles.
pub struct AccessPermissionFilter {
    access: AccessMode,
}

impl AccessPermissionFilter {
    pub fn new(access: AccessMode) -> Self {
        Self { access }
    }
}

impl PreFilter for AccessPermissionFilter {
    fn name(&self) -> &str {
        "access-permission"
    }

    fn matches(&self, _request: &UpdateRequest) -> bool {
        self.access == AccessMode::ByRole
    }

    fn pre_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        if request.accessor().roles().is_empty() {
            warn!(user_id = request.user_id(), "access denied: user has no roles");
            request.accessor_mut().set_response(Response::Forbidden);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use chatflow_core::{FlowError, Update};

    struct Fixed(Option<Vec<String>>);

    impl PermissionAdapter for Fixed {
        fn roles(&self, _user_id: i64) -> Result<Option<Vec<String>>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl PermissionAdapter for Broken {
        fn roles(&self, _user_id: i64) -> Result<Option<Vec<String>>> {
            Err(FlowError::Storage("roles table missing".to_string()))
        }
    }

    fn config() -> PermissionConfig {
        PermissionConfig {
            access: AccessMode::ByRole,
            default_roles: vec!["guest".to_string()],
            assignments: HashMap::from([("7".to_string(), vec!["admin".to_string()])]),
        }
    }

    fn request(user_id: i64) -> UpdateRequest {
        UpdateRequest::new(Update::message(1, 100, user_id, "hi"))
    }

    fn roles_of(request: &UpdateRequest) -> Vec<String> {
        request.accessor().roles().iter().cloned().collect()
    }

    #[test]
    fn adapter_roles_win() {
        let filter = RoleFilter::new(Some(Arc::new(Fixed(Some(vec!["vip".to_string()])))), config());
        let mut req = request(7);
        filter.pre_filter(&mut req).unwrap();
        assert_eq!(roles_of(&req), ["vip"]);
    }

    #[test]
    fn falls_back_to_assignments_then_defaults() {
        let filter = RoleFilter::new(Some(Arc::new(Fixed(None))), config());
        let mut assigned = request(7);
        let mut other = request(8);
        filter.pre_filter(&mut assigned).unwrap();
        filter.pre_filter(&mut other).unwrap();
        assert_eq!(roles_of(&assigned), ["admin"]);
        assert_eq!(roles_of(&other), ["guest"]);
    }

    #[test]
    fn adapter_error_propagates() {
        let filter = RoleFilter::new(Some(Arc::new(Broken)), config());
        assert!(filter.pre_filter(&mut request(7)).is_err());
    }

    #[test]
    fn access_filter_forbids_users_without_roles() {
        let filter = AccessPermissionFilter::new(AccessMode::ByRole);
        let mut req = request(9);
        assert!(filter.matches(&req));
        filter.pre_filter(&mut req).unwrap();
        assert!(matches!(req.response(), Some(Response::Forbidden)));

        let mut allowed = request(9);
        allowed.accessor_mut().set_roles(["user"]);
        filter.pre_filter(&mut allowed).unwrap();
        assert!(allowed.response().is_none());
    }

    #[test]
    fn access_filter_inactive_for_public_bots() {
        let filter = AccessPermissionFilter::new(AccessMode::All);
        assert!(!filter.matches(&request(9)));
    }
}
