use objmon_common::i18n::normalize_locale;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory holding `objmon.db`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// JSON export read by the objective source on every sweep.
    #[serde(default = "default_objectives_file")]
    pub objectives_file: String,
    /// Language for default alert text and noise explanations: `es` titles
    /// read "Alerta: {title}", `en` titles read "Alert: {title}". Unsupported
    /// values fall back to `es`.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Suppression window per (rule, objective) pair.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_execution_enabled")]
    pub enabled: bool,
    #[serde(default = "default_execution_tick_secs")]
    pub tick_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enabled: default_execution_enabled(),
            tick_secs: default_execution_tick_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            objectives_file: default_objectives_file(),
            locale: default_locale(),
            dedup_window_secs: default_dedup_window_secs(),
            execution: ExecutionConfig::default(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_objectives_file() -> String {
    "data/objectives.json".to_string()
}

fn default_locale() -> String {
    objmon_common::i18n::DEFAULT_LOCALE.to_string()
}

fn default_dedup_window_secs() -> u64 {
    86400
}

fn default_execution_enabled() -> bool {
    true
}

fn default_execution_tick_secs() -> u64 {
    300
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config '{}': {}", path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.locale = normalize_locale(&config.locale).to_string();
        if config.execution.tick_secs == 0 {
            anyhow::bail!("execution.tick_secs must be greater than zero");
        }
        if config.dedup_window_secs > i32::MAX as u64 {
            anyhow::bail!("dedup_window_secs is out of range");
        }
        Ok(config)
    }

    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_window_secs as i64)
    }
}
