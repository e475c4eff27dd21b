/// Configuration management for the Taskhub coordination service.
/// Handles loading, parsing, validation, and environment overrides of taskhub.toml
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{HubError, HubResult};

/// Top-level configuration structure for Taskhub
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskhubConfig {
    /// Transport listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage and persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Task workflow tuning (leases, stale thresholds, evaluation spawning)
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeaturesConfig,

    /// External document store (Outline-compatible) settings
    #[serde(default)]
    pub outline: OutlineConfig,

    /// LLM summarizer settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Namespace used for read-only operations when the caller supplies none
    #[serde(default)]
    pub default_namespace: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_namespace: None,
        }
    }
}

/// Storage and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one SQLite database file per namespace
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// When a report submission spawns an evaluation task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationSpawnMode {
    /// Every NORMAL task report spawns an evaluation task (the default)
    #[default]
    Always,

    /// Only reports on tasks above `evaluation_priority_threshold` spawn one
    Priority,

    /// Never spawn evaluation tasks
    Off,
}

/// Task workflow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Claim lease duration in hours
    #[serde(default = "default_lease_duration_hours")]
    pub lease_duration_hours: i64,

    /// Hours a claimed task may sit unstarted before the reaper fails it
    #[serde(default = "default_claimed_timeout_hours")]
    pub claimed_timeout_hours: i64,

    /// Hours an in-progress task may go without updates before the reaper fails it
    #[serde(default = "default_in_progress_timeout_hours")]
    pub in_progress_timeout_hours: i64,

    /// Hours a pre-assigned pending task may sit unclaimed before re-routing
    #[serde(default = "default_assignment_timeout_hours")]
    pub assignment_timeout_hours: i64,

    /// Seconds between reaper sweeps
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Evaluation-task spawn policy. Defaults to `always`; `priority` gates
    /// spawning on `evaluation_priority_threshold`.
    #[serde(default)]
    pub evaluation_spawn: EvaluationSpawnMode,

    /// Minimum parent priority (exclusive) for spawning in `priority` mode
    #[serde(default = "default_evaluation_priority_threshold")]
    pub evaluation_priority_threshold: i64,

    /// Skill required to claim spawned evaluation tasks.
    /// When unset, the parent task's skill is inherited.
    #[serde(default)]
    pub evaluation_skill: Option<String>,
}

fn default_lease_duration_hours() -> i64 {
    1
}

fn default_claimed_timeout_hours() -> i64 {
    12
}

fn default_in_progress_timeout_hours() -> i64 {
    24
}

fn default_assignment_timeout_hours() -> i64 {
    24
}

fn default_reaper_interval_secs() -> u64 {
    3600
}

fn default_evaluation_priority_threshold() -> i64 {
    3
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            lease_duration_hours: default_lease_duration_hours(),
            claimed_timeout_hours: default_claimed_timeout_hours(),
            in_progress_timeout_hours: default_in_progress_timeout_hours(),
            assignment_timeout_hours: default_assignment_timeout_hours(),
            reaper_interval_secs: default_reaper_interval_secs(),
            evaluation_spawn: EvaluationSpawnMode::Always,
            evaluation_priority_threshold: default_evaluation_priority_threshold(),
            evaluation_skill: None,
        }
    }
}

/// Feature flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Draft a knowledge item from high-scoring reports after commit
    #[serde(default = "default_auto_generate_knowledge")]
    pub auto_generate_knowledge: bool,

    /// Minimum evaluation score that triggers knowledge drafting
    #[serde(default = "default_knowledge_score_threshold")]
    pub knowledge_score_threshold: i64,
}

fn default_auto_generate_knowledge() -> bool {
    true
}

fn default_knowledge_score_threshold() -> i64 {
    90
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            auto_generate_knowledge: default_auto_generate_knowledge(),
            knowledge_score_threshold: default_knowledge_score_threshold(),
        }
    }
}

/// External document store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineConfig {
    /// Whether the document store integration is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the document service
    #[serde(default)]
    pub url: String,

    /// Bearer token (env override: OUTLINE_API_KEY)
    #[serde(default)]
    pub api_key: String,

    /// Collection receiving auto-drafted knowledge items
    #[serde(default)]
    pub collection_id: String,

    /// Per-call deadline in seconds
    #[serde(default = "default_external_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_external_timeout_secs() -> u64 {
    30
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            collection_id: String::new(),
            timeout_secs: default_external_timeout_secs(),
        }
    }
}

/// LLM summarizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether the summarizer is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (env override: TASKHUB_LLM_API_KEY)
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Per-call deadline in seconds
    #[serde(default = "default_external_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_temperature() -> f32 {
    0.5
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            timeout_secs: default_external_timeout_secs(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TaskhubConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> HubResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            HubError::Validation(format!(
                "failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let mut config: TaskhubConfig = toml::from_str(&raw)
            .map_err(|e| HubError::Validation(format!("failed to parse config: {}", e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from a file when present, otherwise fall back to defaults.
    /// Environment overrides apply in both cases.
    pub fn load_or_default(path: Option<&Path>) -> HubResult<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                warn!(path = %path.display(), "config file not found, using defaults");
                let mut config = TaskhubConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            None => {
                let mut config = TaskhubConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply environment variable overrides on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("TASKHUB_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(host) = std::env::var("TASKHUB_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TASKHUB_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(port = %port, "ignoring invalid TASKHUB_PORT"),
            }
        }
        if let Ok(namespace) = std::env::var("TASKHUB_NAMESPACE") {
            self.server.default_namespace = Some(namespace);
        }
        if let Ok(key) = std::env::var("OUTLINE_API_KEY") {
            self.outline.api_key = key;
        }
        if let Ok(url) = std::env::var("OUTLINE_URL") {
            self.outline.url = url;
        }
        if let Ok(key) = std::env::var("TASKHUB_LLM_API_KEY") {
            self.llm.api_key = key;
        }
        debug!("configuration loaded");
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> HubResult<()> {
        if self.workflow.lease_duration_hours <= 0 {
            return Err(HubError::Validation(
                "workflow.lease_duration_hours must be positive".to_string(),
            ));
        }
        if self.workflow.claimed_timeout_hours <= 0 || self.workflow.in_progress_timeout_hours <= 0
        {
            return Err(HubError::Validation(
                "workflow stale-task timeouts must be positive".to_string(),
            ));
        }
        if self.workflow.reaper_interval_secs == 0 {
            return Err(HubError::Validation(
                "workflow.reaper_interval_secs must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&(self.features.knowledge_score_threshold as f64)) {
            return Err(HubError::Validation(
                "features.knowledge_score_threshold must lie in [0, 100]".to_string(),
            ));
        }
        if self.outline.enabled && (self.outline.url.is_empty() || self.outline.api_key.is_empty())
        {
            return Err(HubError::Validation(
                "outline.url and outline.api_key are required when outline.enabled".to_string(),
            ));
        }
        if self.llm.enabled && self.llm.api_key.is_empty() {
            return Err(HubError::Validation(
                "llm.api_key is required when llm.enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Database file for a namespace.
    pub fn database_path(&self, namespace: &str) -> PathBuf {
        self.storage.data_dir.join(format!("{}.db", namespace))
    }
}
