use std::sync::Arc;

use chatflow_core::UpdateRequest;
use tracing::{debug, info};

use crate::filter::{ConclusivePostFilter, PostFilter, PreFilter};
use crate::order::{FilterOrder, FilterPhase};

/// Resolves, for one request, the ordered filters that apply to it.
pub trait FilterProvider: Send + Sync {
    fn pre_filters(&self, request: &UpdateRequest) -> Vec<Arc<dyn PreFilter>>;

    fn post_filters(&self, request: &UpdateRequest) -> Vec<Arc<dyn PostFilter>>;

    fn conclusive_post_filters(&self, request: &UpdateRequest) -> Vec<Arc<dyn ConclusivePostFilter>>;
}

struct Registered<F: ?Sized> {
    name: String,
    order: FilterOrder,
    filter: Arc<F>,
}

/// Registry of every filter in the process, populated at startup.
///
/// Each list is kept sorted after every registration. Built once, then
/// shared behind an `Arc` and only read.
#[derive(Default)]
pub struct FilterRegistry {
    pre: Vec<Registered<dyn PreFilter>>,
    post: Vec<Registered<dyn PostFilter>>,
    conclusive: Vec<Registered<dyn ConclusivePostFilter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pre(&mut self, order: FilterOrder, filter: Arc<dyn PreFilter>) {
        let name = filter.name().to_string();
        insert_sorted(&mut self.pre, Registered { name, order, filter }, FilterPhase::Pre);
    }

    pub fn register_post(&mut self, order: FilterOrder, filter: Arc<dyn PostFilter>) {
        let name = filter.name().to_string();
        insert_sorted(&mut self.post, Registered { name, order, filter }, FilterPhase::Post);
    }

    pub fn register_conclusive(&mut self, order: FilterOrder, filter: Arc<dyn ConclusivePostFilter>) {
        let name = filter.name().to_string();
        insert_sorted(
            &mut self.conclusive,
            Registered { name, order, filter },
            FilterPhase::ConclusivePost,
        );
    }

    /// Registered names per phase, in execution order.
    pub fn names(&self, phase: FilterPhase) -> Vec<&str> {
        match phase {
            FilterPhase::Pre => self.pre.iter().map(|r| r.name.as_str()).collect(),
            FilterPhase::Post => self.post.iter().map(|r| r.name.as_str()).collect(),
            FilterPhase::ConclusivePost => self.conclusive.iter().map(|r| r.name.as_str()).collect(),
        }
    }

    pub fn log_summary(&self) {
        info!(
            pre = ?self.names(FilterPhase::Pre),
            post = ?self.names(FilterPhase::Post),
            conclusive = ?self.names(FilterPhase::ConclusivePost),
            "filter registry ready"
        );
    }
}

fn insert_sorted<F: ?Sized>(list: &mut Vec<Registered<F>>, entry: Registered<F>, phase: FilterPhase) {
    debug!(name = %entry.name, order = ?entry.order, phase = ?phase, "filter registered");
    list.push(entry);
    // Stable sort preserves registration order within the same order value.
    list.sort_by_key(|r| r.order.sort_key(phase));
}

impl FilterProvider for FilterRegistry {
    fn pre_filters(&self, request: &UpdateRequest) -> Vec<Arc<dyn PreFilter>> {
        self.pre
            .iter()
            .filter(|r| r.filter.matches(request))
            .map(|r| Arc::clone(&r.filter))
            .collect()
    }

    fn post_filters(&self, request: &UpdateRequest) -> Vec<Arc<dyn PostFilter>> {
        self.post
            .iter()
            .filter(|r| r.filter.matches(request))
            .map(|r| Arc::clone(&r.filter))
            .collect()
    }

    fn conclusive_post_filters(&self, request: &UpdateRequest) -> Vec<Arc<dyn ConclusivePostFilter>> {
        self.conclusive
            .iter()
            .filter(|r| r.filter.matches(request))
            .map(|r| Arc::clone(&r.filter))
            .collect()
    }
}
