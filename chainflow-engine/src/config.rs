//! Configuration for the engine process and for step execution.
//!
//! [`EngineConfig`] is read from the environment once at startup and turned
//! into [`ClientOpts`]. [`StepConfig`] controls how the local step tool
//! checkpoints a step around its execution.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::client::ClientOpts;
use crate::error::{DurableError, DurableResult};

/// Orchestrator base URL used when `INNGEST_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8288";
/// Signing key used for local development when `INNGEST_SIGNING_KEY` is unset.
pub const DEFAULT_SIGNING_KEY: &str = "1234";
/// URL the orchestrator calls back to reach this process.
pub const DEFAULT_FUNCTION_URL: &str = "http://localhost:8080";
/// Address the HTTP listener binds to.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
/// Application id announced to the orchestrator.
pub const DEFAULT_APP_ID: &str = "core";
/// Event that triggers the hello world function.
pub const DEFAULT_TRIGGER_EVENT: &str = "hello.world";
/// Path appended to the base URL to form the register URL.
pub const REGISTER_API_PATH: &str = "/api/v1";

/// Step execution semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepSemantics {
    /// Checkpoint before execution - guarantees at most once execution per retry.
    #[default]
    AtMostOncePerRetry,
    /// Checkpoint after execution - guarantees at least once execution per retry.
    AtLeastOncePerRetry,
}

/// Configuration for step operations.
#[derive(Debug, Clone, Default)]
pub struct StepConfig {
    /// Execution semantics (at-most-once or at-least-once).
    pub step_semantics: StepSemantics,
}

impl StepConfig {
    /// Creates a StepConfig with the given semantics.
    pub fn with_semantics(step_semantics: StepSemantics) -> Self {
        Self { step_semantics }
    }
}

/// Process-level configuration, sourced from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base URL of the orchestration server (`INNGEST_BASE_URL`)
    pub base_url: String,
    /// Signing key passed to the client (`INNGEST_SIGNING_KEY`)
    pub signing_key: String,
    /// Development mode flag (`INNGEST_DEV`, `1` or `true`)
    pub dev: bool,
    /// URL the orchestrator invokes functions at (`ENGINE_FUNCTION_URL`)
    pub function_url: String,
    /// Address the HTTP listener binds (`ENGINE_LISTEN_ADDR`)
    pub listen_addr: SocketAddr,
    /// Application id (`ENGINE_APP_ID`)
    pub app_id: String,
    /// Trigger event for the hello world function (`HELLO_WORLD_TRIGGER`)
    pub trigger_event: String,
}

impl EngineConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> DurableResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults for
    /// unset or empty values.
    pub fn from_lookup<F>(lookup: F) -> DurableResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let base_url = get("INNGEST_BASE_URL", DEFAULT_BASE_URL);
        let function_url = get("ENGINE_FUNCTION_URL", DEFAULT_FUNCTION_URL);
        for (key, url) in [("INNGEST_BASE_URL", &base_url), ("ENGINE_FUNCTION_URL", &function_url)] {
            reqwest::Url::parse(url).map_err(|e| {
                DurableError::validation(format!("{} is not a valid URL ({}): {}", key, url, e))
            })?;
        }

        let listen = get("ENGINE_LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let listen_addr = listen.parse::<SocketAddr>().map_err(|e| {
            DurableError::validation(format!("ENGINE_LISTEN_ADDR is invalid ({}): {}", listen, e))
        })?;

        let dev = matches!(lookup("INNGEST_DEV").as_deref(), Some("1") | Some("true"));

        Ok(Self {
            base_url,
            signing_key: get("INNGEST_SIGNING_KEY", DEFAULT_SIGNING_KEY),
            dev,
            function_url,
            listen_addr,
            app_id: get("ENGINE_APP_ID", DEFAULT_APP_ID),
            trigger_event: get("HELLO_WORLD_TRIGGER", DEFAULT_TRIGGER_EVENT),
        })
    }

    /// The register URL: the base URL plus `/api/v1`. The serve handler
    /// appends `/fn/register` when syncing.
    pub fn register_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), REGISTER_API_PATH)
    }

    /// Client options built from this configuration, passed through unmodified.
    pub fn client_opts(&self) -> ClientOpts {
        ClientOpts {
            app_id: self.app_id.clone(),
            register_url: Some(self.register_url()),
            signing_key: Some(self.signing_key.clone()),
            dev: Some(self.dev),
            url: Some(self.function_url.clone()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            signing_key: DEFAULT_SIGNING_KEY.to_string(),
            dev: false,
            function_url: DEFAULT_FUNCTION_URL.to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            app_id: DEFAULT_APP_ID.to_string(),
            trigger_event: DEFAULT_TRIGGER_EVENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_step_semantics_default() {
        assert_eq!(StepSemantics::default(), StepSemantics::AtMostOncePerRetry);
        assert_eq!(StepConfig::default().step_semantics, StepSemantics::AtMostOncePerRetry);
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.register_url(), "http://localhost:8288/api/v1");
    }

    #[test]
    fn test_overrides_from_env() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("INNGEST_BASE_URL", "http://inngest:8288/"),
            ("INNGEST_SIGNING_KEY", "signkey-test-abc"),
            ("INNGEST_DEV", "true"),
            ("ENGINE_FUNCTION_URL", "http://engine:9000"),
            ("ENGINE_LISTEN_ADDR", "127.0.0.1:9000"),
            ("HELLO_WORLD_TRIGGER", "api/hello.world"),
        ]))
        .unwrap();

        assert!(config.dev);
        assert_eq!(config.signing_key, "signkey-test-abc");
        assert_eq!(config.register_url(), "http://inngest:8288/api/v1");
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.trigger_event, "api/hello.world");
    }

    #[test]
    fn test_dev_flag_values() {
        for (value, expected) in [("1", true), ("true", true), ("0", false), ("yes", false)] {
            let config = EngineConfig::from_lookup(lookup_from(&[("INNGEST_DEV", value)])).unwrap();
            assert_eq!(config.dev, expected, "INNGEST_DEV={}", value);
        }
    }

    #[test]
    fn test_invalid_base_url_is_validation_error() {
        let err = EngineConfig::from_lookup(lookup_from(&[("INNGEST_BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, DurableError::Validation { .. }));
    }

    #[test]
    fn test_invalid_listen_addr_is_validation_error() {
        let err = EngineConfig::from_lookup(lookup_from(&[("ENGINE_LISTEN_ADDR", ":8080")]))
            .unwrap_err();
        assert!(matches!(err, DurableError::Validation { .. }));
    }

    #[test]
    fn test_client_opts_pass_through() {
        let config = EngineConfig::default();
        let opts = config.client_opts();
        assert_eq!(opts.app_id, "core");
        assert_eq!(opts.register_url.as_deref(), Some("http://localhost:8288/api/v1"));
        assert_eq!(opts.signing_key.as_deref(), Some("1234"));
        assert_eq!(opts.dev, Some(false));
        assert_eq!(opts.url.as_deref(), Some("http://localhost:8080"));
    }
}
