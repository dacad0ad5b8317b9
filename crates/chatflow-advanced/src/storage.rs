use chatflow_core::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored payload for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedScenarioEntity {
    /// `"<userId>:<chatId>"`.
    pub id: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

impl AdvancedScenarioEntity {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            updated_at: Utc::now(),
        }
    }
}

pub trait AdvancedScenarioStorage: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<AdvancedScenarioEntity>>;

    fn save(&self, entity: AdvancedScenarioEntity) -> Result<()>;
}

/// Process-local storage. Assumes one in-flight update per user.
#[derive(Default)]
pub struct InMemoryAdvancedScenarioStorage {
    entities: DashMap<String, AdvancedScenarioEntity>,
}

impl InMemoryAdvancedScenarioStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdvancedScenarioStorage for InMemoryAdvancedScenarioStorage {
    fn find_by_id(&self, id: &str) -> Result<Option<AdvancedScenarioEntity>> {
        Ok(self.entities.get(id).map(|e| e.value().clone()))
    }

    fn save(&self, entity: AdvancedScenarioEntity) -> Result<()> {
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }
}
