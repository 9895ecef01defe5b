use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::FeedError;
use crate::llm::{LlmClient, OpenAIClient};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub data: DataSettings,
    pub sessions: SessionSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Appended to the system prompt.
    pub instructions: Option<String>,
}

/// Location of the dataset files, relative file names resolved against `dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub dir: PathBuf,
    pub feeds_file: String,
    pub encoder_params_file: String,
    pub encoder_schema_file: String,
    pub decoder_params_file: String,
    pub decoder_schema_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub timeout_hours: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.1,
            request_timeout_secs: 60,
            instructions: None,
        }
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Data"),
            feeds_file: "Table_feeds_v2.csv".to_string(),
            encoder_params_file: "encoder_params.json".to_string(),
            encoder_schema_file: "encoder_schema.json".to_string(),
            decoder_params_file: "decoder_params.json".to_string(),
            decoder_schema_file: "decoder_schema.json".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_hours: 24,
            sweep_interval_secs: 600,
        }
    }
}

impl SessionSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedscope")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(settings) => return settings,
                Err(e) => tracing::warn!(path = %config_path.display(), error = %e, "ignoring config file"),
            }
        }
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self, FeedError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FeedError::Config(e.to_string()))
    }

    pub fn save(&self) -> Result<(), FeedError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), FeedError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FeedError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the API key from the environment variable specified in settings.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Build an LLM client from the current settings.
    pub fn build_llm_client(&self) -> Result<Arc<dyn LlmClient>, FeedError> {
        let api_key = self.api_key().ok_or_else(|| {
            FeedError::Config(format!(
                "API key not set: export {} to talk to the model",
                self.llm.api_key_env
            ))
        })?;

        let mut client = OpenAIClient::new(api_key)
            .with_model(&self.llm.model)
            .with_temperature(self.llm.temperature)
            .with_timeout(Duration::from_secs(self.llm.request_timeout_secs))?;
        if let Some(url) = &self.llm.base_url {
            client = client.with_base_url(url);
        }
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.data.feeds_file, "Table_feeds_v2.csv");
        assert_eq!(settings.sessions.timeout_hours, 24);
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            port = 9001

            [sessions]
            timeout_hours = 2
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.sessions.timeout_hours, 2);
        assert_eq!(settings.sessions.sweep_interval_secs, 600);
        assert_eq!(settings.llm, LlmSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.llm.model = "gpt-4o".into();
        settings.data.dir = PathBuf::from("/srv/feeds");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = \"not a port\"").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut settings = Settings::default();
        settings.llm.api_key_env = "FEEDSCOPE_TEST_KEY_THAT_IS_NEVER_SET".into();
        assert!(settings.api_key().is_none());
        assert!(matches!(
            settings.build_llm_client(),
            Err(FeedError::Config(_))
        ));
    }
}
