//! Application configuration.
//!
//! Settings are layered: built-in defaults, then the TOML config file,
//! then `BANTER__`-prefixed environment variables (`__` separates nesting,
//! e.g. `BANTER__SERVER__PORT=9090`). A default config file is written on
//! first run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

const APP_NAME: &str = "banter";
const ENV_PREFIX: &str = "BANTER";

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub chat: ChatSettings,
    pub naming: NamingSettings,
    pub storage: StorageSettings,
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Upstream LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Backend kind: "openai", "compat" (also "lmstudio"/"ollama"), or "custom".
    pub backend: String,
    /// Base URL for the compat and custom kinds; ignored by "openai".
    pub endpoint: String,
    /// Model identifier forwarded upstream.
    pub model: String,
    /// Bearer credential; required by "openai", optional for "compat".
    pub api_key: String,
    /// Extra headers for the custom kind.
    pub headers: HashMap<String, String>,
    /// Whether chat requests use the streaming path.
    pub streaming: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            backend: "compat".to_string(),
            endpoint: "http://localhost:1234/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key: String::new(),
            headers: HashMap::new(),
            streaming: true,
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// System prompt for sessions created without one.
    pub system_prompt: String,
    /// Retention cap on stored messages per session.
    pub max_history: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful AI assistant.".to_string(),
            max_history: 100,
        }
    }
}

/// Session auto-naming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingSettings {
    pub enabled: bool,
    /// Prompt template; `{user}` and `{assistant}` are replaced with the
    /// first exchange's content.
    pub prompt: String,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prompt: "Suggest a short two-to-four word name for a chat that starts like this:\n\
                     User: {user}\n\
                     Assistant: {assistant}\n\
                     Reply with only the name, words joined by underscores."
                .to_string(),
        }
    }
}

/// On-disk storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory for session documents. Defaults to
    /// `{data_dir}/banter/sessions` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_dir: Option<PathBuf>,
}

impl Settings {
    /// Resolved sessions directory.
    pub fn sessions_dir(&self) -> PathBuf {
        self.storage.sessions_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
                .join("sessions")
        })
    }
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}

/// Load settings, writing a default config file first if none exists.
pub fn load_or_init(path: &Path) -> Result<Settings> {
    if !path.exists() {
        write_default_config(path)?;
        info!("wrote default config to {}", path.display());
    }
    load(path)
}

/// Load settings from a file plus environment overrides.
pub fn load(path: &Path) -> Result<Settings> {
    let built = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .context("building configuration")?;

    built.try_deserialize().context("parsing configuration")
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let body = format!(
        "# Configuration for {APP_NAME}\n# File: {}\n\n{}",
        path.display(),
        toml::to_string_pretty(&Settings::default())
            .context("serializing default config to TOML")?
    );
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.llm.backend, "compat");
        assert!(settings.llm.streaming);
        assert_eq!(settings.chat.max_history, 100);
        assert!(settings.naming.enabled);
    }

    #[test]
    fn test_load_or_init_writes_default_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let settings = load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.server.host, "127.0.0.1");

        // The written file round-trips.
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.llm.endpoint, settings.llm.endpoint);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[server]\nport = 9999\n\n[llm]\nbackend = \"openai\"\napi_key = \"sk-x\"\n",
        )
        .unwrap();

        let settings = load(&path).unwrap();
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.llm.backend, "openai");
        assert_eq!(settings.chat.max_history, 100);
    }

    #[test]
    fn test_sessions_dir_override() {
        let mut settings = Settings::default();
        settings.storage.sessions_dir = Some(PathBuf::from("/tmp/banter-sessions"));
        assert_eq!(
            settings.sessions_dir(),
            PathBuf::from("/tmp/banter-sessions")
        );
    }
}
