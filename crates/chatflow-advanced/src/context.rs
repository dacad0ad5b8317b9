use chatflow_core::{Response, UpdateRequest};
use serde_json::Value;

/// Mutable state shared by the scenarios taking part in one run.
#[derive(Debug)]
pub struct UserScenarioContext<'a> {
    pub request: &'a UpdateRequest,
    /// Payload restored from storage, `Null` for a new conversation.
    pub data: Value,
    pub is_end: bool,
    /// Set to hand control to another scenario after the current step.
    pub next_scenario: Option<String>,
    pub response: Option<Response>,
}

impl<'a> UserScenarioContext<'a> {
    pub fn new(request: &'a UpdateRequest, data: Option<Value>) -> Self {
        Self {
            request,
            data: data.unwrap_or(Value::Null),
            is_end: false,
            next_scenario: None,
            response: None,
        }
    }

    pub fn end(&mut self) {
        self.is_end = true;
    }

    pub fn hand_off(&mut self, scenario: impl Into<String>) {
        self.next_scenario = Some(scenario.into());
    }

    pub fn reply(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Field of an object payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a field, turning a non-object payload into an empty object first.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if !self.data.is_object() {
            self.data = Value::Object(Default::default());
        }
        if let Value::Object(map) = &mut self.data {
            map.insert(key.into(), value.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::Update;
    use serde_json::json;

    #[test]
    fn set_replaces_non_object_payload() {
        let request = UpdateRequest::new(Update::message(1, 2, 3, "hi"));
        let mut ctx = UserScenarioContext::new(&request, Some(json!("legacy")));
        ctx.set("step", 2);
        assert_eq!(ctx.data, json!({ "step": 2 }));
        assert_eq!(ctx.get("step"), Some(&json!(2)));
        assert!(!ctx.is_end);
    }
}
