//! Routed dispatch: an explicit table from request guards to handlers.

pub mod filters;
pub mod handler;
pub mod route;

pub use filters::{HasRoleFilter, RoutePopulateFilter};
pub use handler::RoutedUpdateHandler;
pub use route::{Route, RouteTable};
