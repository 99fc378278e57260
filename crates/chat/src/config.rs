//! Configuration loading for the chat client
//!
//! Settings are resolved in this order (later wins per field):
//! 1. Built-in defaults
//! 2. JSON file (~/.config/herald/client.json)
//! 3. Runtime environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config filename in the Herald config directory
const CONFIG_FILE: &str = "client.json";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_LOCAL_NUMBER: &str = "+1234567890";

/// Runtime configuration for the chat engine and relay client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the relay backend, without the `/api` suffix
    pub api_url: String,
    /// The user's own numbers; used to recognise outgoing messages
    pub local_numbers: Vec<String>,
    /// Period of the conversation list poll
    pub conversation_poll: Duration,
    /// Period of the active thread poll
    pub thread_poll: Duration,
    /// Per-request timeout; `None` leaves it to the transport
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            local_numbers: vec![DEFAULT_LOCAL_NUMBER.to_string()],
            conversation_poll: Duration::from_secs(5),
            thread_poll: Duration::from_secs(3),
            request_timeout: None,
        }
    }
}

/// On-disk format; every field is optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    api_url: Option<String>,
    local_numbers: Option<Vec<String>>,
    conversation_poll_secs: Option<u64>,
    thread_poll_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Load configuration from the config directory and environment
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if config::config_exists(CONFIG_FILE) {
            let file: ConfigFile = config::load_json(CONFIG_FILE)?;
            config.apply_file(file);
        }

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific JSON file, then apply the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: ConfigFile = config::load_json_file(path)?;
        let mut config = Self::default();
        config.apply_file(file);
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string (no environment overrides)
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json).context("Failed to parse config JSON")?;
        let mut config = Self::default();
        config.apply_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path (~/.config/herald/client.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.api_url {
            self.api_url = url;
        }
        if let Some(numbers) = file.local_numbers {
            self.local_numbers = numbers;
        }
        if let Some(secs) = file.conversation_poll_secs {
            self.conversation_poll = Duration::from_secs(secs);
        }
        if let Some(secs) = file.thread_poll_secs {
            self.thread_poll = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("HERALD_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(numbers) = var("HERALD_MY_NUMBER") {
            let numbers: Vec<String> = numbers
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
            if !numbers.is_empty() {
                self.local_numbers = numbers;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.api_url.is_empty(), "api_url must not be empty");
        anyhow::ensure!(
            !self.conversation_poll.is_zero() && !self.thread_poll.is_zero(),
            "poll intervals must be at least one second"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.conversation_poll, Duration::from_secs(5));
        assert_eq!(config.thread_poll, Duration::from_secs(3));
        assert_eq!(config.local_numbers, vec!["+1234567890".to_string()]);
    }

    #[test]
    fn test_parse_partial_file() {
        let json = r#"{
            "api_url": "https://relay.example.com",
            "local_numbers": ["+31612345678"],
            "thread_poll_secs": 2
        }"#;

        let config = ClientConfig::from_json(json).unwrap();
        assert_eq!(config.api_url, "https://relay.example.com");
        assert_eq!(config.local_numbers, vec!["+31612345678".to_string()]);
        assert_eq!(config.thread_poll, Duration::from_secs(2));
        assert_eq!(config.conversation_poll, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let json = r#"{ "conversation_poll_secs": 0 }"#;
        assert!(ClientConfig::from_json(json).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HERALD_API_URL", "http://10.0.0.2:8000"),
            ("HERALD_MY_NUMBER", "+31612345678, +4915112345678"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_url, "http://10.0.0.2:8000");
        assert_eq!(
            config.local_numbers,
            vec!["+31612345678".to_string(), "+4915112345678".to_string()]
        );
    }
}
