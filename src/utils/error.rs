use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Refresh token rejected (invalid_grant): {body}")]
    InvalidGrant { body: String },

    #[error("Authentication failed ({status}): {body}")]
    AuthenticationError { status: u16, body: String },

    #[error("Session login failed: {message}")]
    SessionError { message: String },

    #[error("Fetching {entity} page at offset {start} failed ({status}): {body}")]
    FetchError {
        entity: String,
        start: usize,
        status: u16,
        body: String,
    },

    #[error("Upload of batch {batch} failed ({status}): {body}")]
    UploadError {
        batch: usize,
        status: u16,
        body: String,
    },

    #[error("Data source creation failed ({status}): {body}")]
    DataSourceError { status: u16, body: String },

    #[error("Secret store error: {message}")]
    SecretStoreError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Source,
    Sink,
    Configuration,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::InvalidGrant { .. }
            | SyncError::AuthenticationError { .. }
            | SyncError::SessionError { .. } => ErrorCategory::Authentication,
            SyncError::ApiError(_) => ErrorCategory::Network,
            SyncError::FetchError { .. } => ErrorCategory::Source,
            SyncError::UploadError { .. } | SyncError::DataSourceError { .. } => {
                ErrorCategory::Sink
            }
            SyncError::ConfigError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            SyncError::IoError(_) | SyncError::SecretStoreError { .. } => ErrorCategory::Storage,
            SyncError::CsvError(_) | SyncError::SerializationError(_) => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Source => ErrorSeverity::Medium,
            ErrorCategory::Sink | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Authentication
            | ErrorCategory::Configuration
            | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// Whether re-running the job unchanged has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ApiError(e) => e.is_timeout() || e.is_connect(),
            SyncError::UploadError { status, .. } | SyncError::FetchError { status, .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::InvalidGrant { .. } => {
                "Both the stored and the fallback refresh token were rejected; run `authorize --code <code>` to bootstrap a new one"
            }
            SyncError::AuthenticationError { .. } => {
                "Check bullhorn.client_id, bullhorn.client_secret and bullhorn.redirect_uri"
            }
            SyncError::SessionError { .. } => {
                "Check bullhorn.swimlane / login_base_url and that the API user may log in"
            }
            SyncError::ApiError(_) => "Check network connectivity and retry the run",
            SyncError::FetchError { .. } => {
                "Check the fetch.where clause and the field list for the selected entity"
            }
            SyncError::UploadError { .. } => {
                "Check plecto.data_source_id and that the data source defines all uploaded fields"
            }
            SyncError::DataSourceError { .. } => {
                "Check the Plecto credentials, or set plecto.data_source_id to an existing data source"
            }
            SyncError::SecretStoreError { .. } => {
                "Check the [secrets] section and the permissions of the secret backend"
            }
            SyncError::ConfigError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::ConfigValidationError { .. } => {
                "Fix the configuration file and run `check-config`"
            }
            SyncError::IoError(_) => "Check file paths and permissions",
            SyncError::CsvError(_) | SyncError::SerializationError(_) => {
                "Inspect the debug snapshot and the raw API response"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Authentication => format!("Could not authenticate with Bullhorn: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Source => format!("Could not read records from Bullhorn: {}", self),
            ErrorCategory::Sink => format!("Could not deliver registrations to Plecto: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Data => format!("Unexpected data: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
