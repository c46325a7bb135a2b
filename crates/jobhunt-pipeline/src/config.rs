use std::path::PathBuf;
use std::time::Duration;

use jobhunt_matcher::{MatchConfig, MatchConfigError};
use jobhunt_storage::HttpClientConfig;

pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_EMAIL_FROM: &str = "jobhunter@noreply.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const DEFAULT_CRON: &str = "0 0 6 * * *";
/// Looked up in the data directory when `JOBHUNT_MATCHING_CONFIG` is unset.
pub const MATCHING_CONFIG_FILE: &str = "matching.yaml";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub matching_config: Option<PathBuf>,
    pub anthropic_api_key: Option<String>,
    pub llm_model: String,
    pub sendgrid_api_key: Option<String>,
    pub email_to: Option<String>,
    pub email_from: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub max_cover_letters: usize,
    pub scheduler_enabled: bool,
    pub cron: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl PipelineConfig {
    /// Load `.env` into the process environment when present. Variables
    /// already set win.
    pub fn load_dotenv() {
        dotenvy::dotenv().ok();
    }

    /// Read the process environment, after loading `.env` when present.
    pub fn from_env() -> Self {
        Self::load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            data_dir: non_empty("JOBHUNT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            matching_config: non_empty("JOBHUNT_MATCHING_CONFIG").map(PathBuf::from),
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            llm_model: non_empty("JOBHUNT_LLM_MODEL")
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            sendgrid_api_key: non_empty("SENDGRID_API_KEY"),
            email_to: non_empty("EMAIL_TO"),
            email_from: non_empty("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            user_agent: non_empty("JOBHUNT_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            http_timeout_secs: non_empty("JOBHUNT_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            request_delay_ms: non_empty("JOBHUNT_REQUEST_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            max_cover_letters: non_empty("JOBHUNT_MAX_COVER_LETTERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            scheduler_enabled: non_empty("JOBHUNT_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            cron: non_empty("JOBHUNT_CRON").unwrap_or_else(|| DEFAULT_CRON.to_string()),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            per_source_delay: (self.request_delay_ms > 0)
                .then(|| Duration::from_millis(self.request_delay_ms)),
            ..Default::default()
        }
    }

    /// Explicit path first, then `matching.yaml` in the data directory, then
    /// built-in defaults. A file that exists but fails validation is an error.
    pub fn load_match_config(&self) -> Result<MatchConfig, MatchConfigError> {
        if let Some(path) = &self.matching_config {
            return MatchConfig::from_path(path);
        }
        let fallback = self.data_dir.join(MATCHING_CONFIG_FILE);
        if fallback.is_file() {
            return MatchConfig::from_path(fallback);
        }
        let config = MatchConfig::default();
        config.validate()?;
        Ok(config)
    }
}
