//! Conversation identity for scenarios.

use std::sync::Arc;

use chatflow_core::{Result, UpdateRequest};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Candidate ids for a request, tried in order, plus a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioIdData {
    pub ids: Vec<String>,
    pub fallback_id: Option<String>,
}

/// Derives and records which scenario id a conversation is on.
pub trait ScenarioIdResolver: Send + Sync {
    fn resolve_id(&self, request: &UpdateRequest) -> Result<ScenarioIdData>;

    /// Fresh id for a conversation that has none that matches.
    fn generate_id(&self, request: &UpdateRequest) -> String;

    /// Make `id` the conversation's id of record.
    fn save_new_id(&self, request: &UpdateRequest, id: &str) -> Result<()>;
}

/// Tracks the current scenario id per conversation key.
pub trait ScenarioIdRepositoryAdapter: Send + Sync {
    fn find(&self, key: &str) -> Result<Option<String>>;

    fn save(&self, key: &str, id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryScenarioIdRepository {
    ids: DashMap<String, String>,
}

impl InMemoryScenarioIdRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioIdRepositoryAdapter for InMemoryScenarioIdRepository {
    fn find(&self, key: &str) -> Result<Option<String>> {
        Ok(self.ids.get(key).map(|id| id.value().clone()))
    }

    fn save(&self, key: &str, id: &str) -> Result<()> {
        self.ids.insert(key.to_string(), id.to_string());
        Ok(())
    }
}

/// Default resolver.
///
/// | | with id repository | without |
/// |---|---|---|
/// | candidates | stored id for `"<userId>:<chatId>"` | none |
/// | fallback | chat id | chat id |
/// | generated | random UUID | chat id |
/// | save | stored under the key | no-op |
pub struct SimpleScenarioIdResolver {
    adapter: Option<Arc<dyn ScenarioIdRepositoryAdapter>>,
}

impl SimpleScenarioIdResolver {
    pub fn new(adapter: Option<Arc<dyn ScenarioIdRepositoryAdapter>>) -> Self {
        Self { adapter }
    }
}

impl ScenarioIdResolver for SimpleScenarioIdResolver {
    fn resolve_id(&self, request: &UpdateRequest) -> Result<ScenarioIdData> {
        let ids = match &self.adapter {
            Some(adapter) => adapter
                .find(&request.conversation_key())?
                .into_iter()
                .collect(),
            None => Vec::new(),
        };
        Ok(ScenarioIdData {
            ids,
            fallback_id: Some(request.chat_id().to_string()),
        })
    }

    fn generate_id(&self, request: &UpdateRequest) -> String {
        match &self.adapter {
            Some(_) => Uuid::new_v4().to_string(),
            None => request.chat_id().to_string(),
        }
    }

    fn save_new_id(&self, request: &UpdateRequest, id: &str) -> Result<()> {
        if let Some(adapter) = &self.adapter {
            let key = request.conversation_key();
            adapter.save(&key, id)?;
            debug!(key, scenario_id = id, "scenario id saved");
        }
        Ok(())
    }
}
