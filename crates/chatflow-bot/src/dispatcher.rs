use std::sync::Arc;

use chatflow_core::Update;
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::pipeline::{HandleOutcome, UpdatePipeline};

/// Deferred entry point: runs each update on its own task while bounding
/// how many updates of the same user are in flight.
///
/// Permits are taken before the task is spawned, so updates of one user
/// start in the order they were dispatched. A user's semaphore is dropped
/// once nothing of theirs is queued or running.
pub struct UpdateDispatcher {
    pipeline: Arc<UpdatePipeline>,
    max_per_user: usize,
    /// user id -> permits.
    permits: Arc<DashMap<i64, Arc<Semaphore>>>,
}

impl UpdateDispatcher {
    pub fn new(pipeline: Arc<UpdatePipeline>, max_per_user: usize) -> Self {
        Self {
            pipeline,
            max_per_user: max_per_user.max(1),
            permits: Arc::new(DashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<UpdatePipeline> {
        &self.pipeline
    }

    /// Users with updates queued or in flight.
    pub fn active_users(&self) -> usize {
        self.permits.len()
    }

    /// Wait for a free slot for the update's user, then spawn the pipeline.
    pub async fn dispatch(&self, update: Update) -> JoinHandle<HandleOutcome> {
        let user_id = update.user_id;
        let semaphore = Arc::clone(
            self.permits
                .entry(user_id)
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_user)))
                .value(),
        );

        let permit = match semaphore.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                warn!(user_id, error = %e, "user semaphore closed, running unbounded");
                None
            }
        };
        debug!(user_id, update_id = update.update_id, "update dispatched");

        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        let max = self.max_per_user;
        tokio::spawn(async move {
            let outcome = pipeline.handle(update).await;
            drop(permit);
            // The map holds the only reference once no dispatch is waiting
            // on, or holding, a permit of this user.
            permits.remove_if(&user_id, |_, s| {
                Arc::strong_count(s) == 1 && s.available_permits() == max
            });
            outcome
        })
    }
}
