pub mod filter;
pub mod not_handled;
pub mod order;
pub mod permission;
pub mod registry;
pub mod scenario_id;

pub use filter::{ConclusivePostFilter, PostFilter, PreFilter};
pub use not_handled::NotHandledFilter;
pub use order::{FilterOrder, FilterPhase, PrioritySlot};
pub use permission::{AccessPermissionFilter, PermissionAdapter, RoleFilter};
pub use registry::{FilterProvider, FilterRegistry};
pub use scenario_id::ScenarioIdPersistFilter;
