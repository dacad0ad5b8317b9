use serde::{Deserialize, Serialize};

/// Which filter list an order value is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPhase {
    Pre,
    Post,
    ConclusivePost,
}

/// Fixed slots reserved for built-in filters.
///
/// Pre-filter slots sort before every user pre-filter, post-filter slots
/// after every user post-filter, whatever order value a user declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritySlot {
    Role,
    AccessPermission,
    RoutePopulate,
    HasRole,
    ScenarioPopulate,
    NotHandled,
    ScenarioIdPersist,
}

impl PrioritySlot {
    fn rank(self) -> i64 {
        match self {
            PrioritySlot::Role => 0,
            PrioritySlot::AccessPermission => 1,
            PrioritySlot::RoutePopulate => 2,
            PrioritySlot::HasRole => 3,
            PrioritySlot::ScenarioPopulate => 4,
            PrioritySlot::NotHandled => 0,
            PrioritySlot::ScenarioIdPersist => 1,
        }
    }
}

/// Where a filter sits in its list. Lower runs earlier; ties keep
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOrder {
    Priority(PrioritySlot),
    User(i32),
}

const SLOT_BAND: i64 = 1_000;

impl FilterOrder {
    /// Sort key in a space wider than `i32`, so user values can never reach
    /// the built-in bands.
    pub fn sort_key(self, phase: FilterPhase) -> i64 {
        match (self, phase) {
            (FilterOrder::User(order), _) => i64::from(order),
            (FilterOrder::Priority(slot), FilterPhase::Pre) => {
                i64::from(i32::MIN) - SLOT_BAND + slot.rank()
            }
            (FilterOrder::Priority(slot), _) => i64::from(i32::MAX) + 1 + slot.rank(),
        }
    }
}

impl Default for FilterOrder {
    fn default() -> Self {
        FilterOrder::User(0)
    }
}
