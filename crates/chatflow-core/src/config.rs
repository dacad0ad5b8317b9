use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

pub const DEFAULT_MAX_THREADS_PER_USER: usize = 1;
pub const DEFAULT_NOT_HANDLED_TEXT: &str = "Sorry, I did not understand that request.";
pub const DEFAULT_FORBIDDEN_TEXT: &str = "You do not have access to this bot!";
pub const DEFAULT_INTERNAL_ERROR_TEXT: &str = "Something went wrong, please try again later.";

/// Top-level config (chatflow.toml + CHATFLOW_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub update_handler: UpdateHandlerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
        }
    }
}

/// Which handlers are registered into the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateHandlerConfig {
    /// Routed (controller-style) dispatch.
    #[serde(default = "bool_true")]
    pub mvc_enabled: bool,
    #[serde(default = "bool_true")]
    pub scenario_enabled: bool,
    #[serde(default = "bool_true")]
    pub advanced_scenario_enabled: bool,
    /// Attach a NotHandled response when no handler claimed the request.
    #[serde(default = "bool_true")]
    pub set_default_answer: bool,
    /// When false, an unsafe `max_threads_per_user` with scenarios enabled
    /// only logs a warning instead of failing startup.
    #[serde(default = "bool_true")]
    pub enabled_warning_for_scenario: bool,
}

impl Default for UpdateHandlerConfig {
    fn default() -> Self {
        Self {
            mvc_enabled: true,
            scenario_enabled: true,
            advanced_scenario_enabled: true,
            set_default_answer: true,
            enabled_warning_for_scenario: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Concurrent updates processed per user. Scenarios assume 1.
    #[serde(default = "default_max_threads_per_user")]
    pub max_threads_per_user: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_threads_per_user: DEFAULT_MAX_THREADS_PER_USER,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Everyone may talk to the bot.
    #[default]
    All,
    /// Only users holding at least one role.
    ByRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default)]
    pub access: AccessMode,
    /// Roles granted to users without an explicit assignment.
    #[serde(default)]
    pub default_roles: Vec<String>,
    /// Static user id -> roles table, keyed by the stringified user id.
    #[serde(default)]
    pub assignments: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_not_handled")]
    pub not_handled: String,
    #[serde(default = "default_forbidden")]
    pub forbidden: String,
    #[serde(default = "default_internal_error")]
    pub internal_error: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            not_handled: default_not_handled(),
            forbidden: default_forbidden(),
            internal_error: default_internal_error(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_bot_name() -> String {
    "chatflow".to_string()
}
fn default_max_threads_per_user() -> usize {
    DEFAULT_MAX_THREADS_PER_USER
}
fn default_not_handled() -> String {
    DEFAULT_NOT_HANDLED_TEXT.to_string()
}
fn default_forbidden() -> String {
    DEFAULT_FORBIDDEN_TEXT.to_string()
}
fn default_internal_error() -> String {
    DEFAULT_INTERNAL_ERROR_TEXT.to_string()
}

impl FlowConfig {
    /// Load config from a TOML file with CHATFLOW_* env var overrides.
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: FlowConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CHATFLOW_").split("__"))
            .extract()
            .map_err(|e| FlowError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.max_threads_per_user == 0 {
            return Err(FlowError::Config(
                "session.max_threads_per_user must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// True when scenarios are enabled while more than one update per user
    /// may be processed concurrently. Scenario state is read-modify-write
    /// without locking, so this combination can lose transitions.
    pub fn has_unsafe_scenario_concurrency(&self) -> bool {
        self.session.max_threads_per_user != 1 && self.update_handler.scenario_enabled
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chatflow/chatflow.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let config = FlowConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.update_handler.set_default_answer);
        assert_eq!(config.session.max_threads_per_user, 1);
        assert!(!config.has_unsafe_scenario_concurrency());
    }

    #[test]
    fn load_reads_file_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chatflow.toml",
                r#"
                [update_handler]
                mvc_enabled = false

                [permission]
                access = "by_role"
                default_roles = ["user"]

                [permission.assignments]
                "42" = ["admin"]
                "#,
            )?;
            jail.set_env("CHATFLOW_SESSION__MAX_THREADS_PER_USER", "4");

            let config = FlowConfig::load(Some("chatflow.toml")).expect("load");
            assert!(!config.update_handler.mvc_enabled);
            assert!(config.update_handler.scenario_enabled);
            assert_eq!(config.permission.access, AccessMode::ByRole);
            assert_eq!(config.permission.assignments["42"], vec!["admin".to_string()]);
            assert_eq!(config.session.max_threads_per_user, 4);
            assert!(config.has_unsafe_scenario_concurrency());
            Ok(())
        });
    }

    #[test]
    fn zero_threads_rejected() {
        let mut config = FlowConfig::default();
        config.session.max_threads_per_user = 0;
        assert!(matches!(config.validate(), Err(FlowError::Config(_))));
    }
}
