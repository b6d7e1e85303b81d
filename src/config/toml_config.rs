use crate::core::fetcher::PageFailurePolicy;
use crate::domain::model::{Credential, EntityKind};
use crate::utils::error::{Result, SyncError};
use crate::utils::logger::LogFormat;
use crate::utils::time::MAX_LOOKBACK_HOURS;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub bullhorn: BullhornConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub plecto: PlectoConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    pub snapshot: Option<SnapshotConfig>,
    pub http: Option<HttpConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BullhornConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_swimlane")]
    pub swimlane: String,
    pub auth_base_url: Option<String>,
    pub login_base_url: Option<String>,
    pub initial_refresh_token: Option<String>,
    pub fallback_refresh_token: Option<String>,
    #[serde(default = "default_refresh_token_secret")]
    pub refresh_token_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub entity: EntityKind,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub lookback_hours: Option<u64>,
    pub action_filter: Option<String>,
    #[serde(default)]
    pub on_page_error: PageFailurePolicy,
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlectoConfig {
    #[serde(default = "default_plecto_base_url")]
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub data_source_id: Option<String>,
    pub data_source_title: Option<String>,
    #[serde(default = "default_member_api_provider")]
    pub member_api_provider: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub per_record: bool,
    #[serde(default)]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackend {
    #[default]
    File,
    KeyVault,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub backend: SecretBackend,
    #[serde(default = "default_secrets_path")]
    pub path: String,
    pub vault_url: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authority_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    pub level: Option<String>,
}

fn default_redirect_uri() -> String {
    "https://welcome.bullhornstaffing.com".to_string()
}

fn default_swimlane() -> String {
    "ger".to_string()
}

fn default_refresh_token_secret() -> String {
    "BullhornRefreshToken".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_plecto_base_url() -> String {
    "https://app.plecto.com".to_string()
}

fn default_member_api_provider() -> String {
    "Bullhorn".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_secrets_path() -> String {
    ".bullhorn-secrets.json".to_string()
}

fn default_snapshot_path() -> String {
    "./snapshots".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            entity: EntityKind::default(),
            page_size: default_page_size(),
            where_clause: None,
            lookback_hours: None,
            action_filter: None,
            on_page_error: PageFailurePolicy::default(),
            max_pages: None,
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::default(),
            path: default_secrets_path(),
            vault_url: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authority_url: None,
        }
    }
}

/// Treats empty strings and unresolved `${VAR}` placeholders as unset.
fn resolved(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.contains("${"))
}

impl BullhornConfig {
    pub fn auth_base_url(&self) -> String {
        match resolved(&self.auth_base_url) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://auth-{}.bullhornstaffing.com", self.swimlane),
        }
    }

    pub fn login_base_url(&self) -> String {
        match resolved(&self.login_base_url) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://rest-{}.bullhornstaffing.com", self.swimlane),
        }
    }

    pub fn initial_refresh_token(&self) -> Option<&str> {
        resolved(&self.initial_refresh_token)
    }

    pub fn fallback_refresh_token(&self) -> Option<&str> {
        resolved(&self.fallback_refresh_token)
    }

    pub fn credential(&self, refresh_token: impl Into<String>) -> Credential {
        Credential {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: refresh_token.into(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }
}

impl PlectoConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn data_source_id(&self) -> Option<&str> {
        resolved(&self.data_source_id)
    }
}

impl SyncConfig {
    /// Loads the configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value, leaving unknown variables untouched
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SyncError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.http
            .as_ref()
            .and_then(|h| h.timeout_seconds)
            .map(Duration::from_secs)
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    pub fn snapshot_dir(&self) -> Option<&str> {
        self.snapshot
            .as_ref()
            .filter(|s| s.enabled)
            .map(|s| s.path.as_str())
    }

    pub fn log_format(&self) -> LogFormat {
        self.logging.as_ref().map(|l| l.format).unwrap_or_default()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("bullhorn.client_id", &self.bullhorn.client_id)?;
        validation::validate_non_empty_string(
            "bullhorn.client_secret",
            &self.bullhorn.client_secret,
        )?;
        validation::validate_url("bullhorn.redirect_uri", &self.bullhorn.redirect_uri)?;
        validation::validate_url("bullhorn.auth_base_url", &self.bullhorn.auth_base_url())?;
        validation::validate_url("bullhorn.login_base_url", &self.bullhorn.login_base_url())?;
        validation::validate_non_empty_string(
            "bullhorn.refresh_token_secret",
            &self.bullhorn.refresh_token_secret,
        )?;

        validation::validate_range("fetch.page_size", self.fetch.page_size, 1, 500)?;
        if let Some(max_pages) = self.fetch.max_pages {
            validation::validate_range("fetch.max_pages", max_pages, 1, usize::MAX)?;
        }
        if let Some(hours) = self.fetch.lookback_hours {
            validation::validate_range("fetch.lookback_hours", hours, 1, MAX_LOOKBACK_HOURS)?;
        }
        if self.fetch.action_filter.is_some() && self.fetch.entity != EntityKind::Note {
            return Err(SyncError::ConfigValidationError {
                field: "fetch.action_filter".to_string(),
                message: "action filtering only applies to notes".to_string(),
            });
        }

        validation::validate_url("plecto.base_url", &self.plecto.base_url)?;
        validation::validate_non_empty_string("plecto.email", &self.plecto.email)?;
        validation::validate_non_empty_string("plecto.password", &self.plecto.password)?;
        validation::validate_range("plecto.batch_size", self.plecto.batch_size, 1, 100)?;

        match self.secrets.backend {
            SecretBackend::File => validation::validate_path("secrets.path", &self.secrets.path)?,
            SecretBackend::KeyVault => {
                let vault_url =
                    validation::validate_required_field("secrets.vault_url", &self.secrets.vault_url)?;
                validation::validate_url("secrets.vault_url", vault_url)?;
                for (field, value) in [
                    ("secrets.tenant_id", &self.secrets.tenant_id),
                    ("secrets.client_id", &self.secrets.client_id),
                    ("secrets.client_secret", &self.secrets.client_secret),
                ] {
                    let value = validation::validate_required_field(field, value)?;
                    validation::validate_non_empty_string(field, value)?;
                }
            }
            SecretBackend::Memory => {}
        }

        if let Some(dir) = self.snapshot_dir() {
            validation::validate_path("snapshot.path", dir)?;
        }

        Ok(())
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
