use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{message}")]
    ApiError { status: u16, message: String },

    #[error("{message}")]
    InvalidResponse { message: String },

    #[error("{message}")]
    JobFailed { message: String },

    #[error("Job {job_id} not found")]
    NotFound { job_id: String },

    #[error("Job {job_id} has not finished (status: {status})")]
    JobNotFinished { job_id: String, status: String },

    #[error("Job polling timeout")]
    PollTimeout { attempts: u32 },

    #[error("Request timeout - please try again or use polling mode")]
    StreamTimeout { timeout_secs: u64 },

    #[error("{message}")]
    StreamError { message: String },

    #[error("Agent invocation failed: {details}")]
    AgentInvocationFailed { details: String },

    #[error("Agent did not finish within {elapsed_ms}ms")]
    AgentTimeout { elapsed_ms: u64 },
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Validation,
    Agent,
    Job,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RelayError {
    pub fn config(message: impl Into<String>) -> Self {
        RelayError::ConfigError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::ValidationError {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        RelayError::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::Http(_)
            | RelayError::ApiError { .. }
            | RelayError::InvalidResponse { .. }
            | RelayError::StreamTimeout { .. }
            | RelayError::StreamError { .. } => ErrorCategory::Network,
            RelayError::TomlError(_)
            | RelayError::ConfigError { .. }
            | RelayError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            RelayError::ValidationError { .. } | RelayError::SerializationError(_) => {
                ErrorCategory::Validation
            }
            RelayError::AgentInvocationFailed { .. } | RelayError::AgentTimeout { .. } => {
                ErrorCategory::Agent
            }
            RelayError::JobFailed { .. }
            | RelayError::NotFound { .. }
            | RelayError::JobNotFinished { .. }
            | RelayError::PollTimeout { .. } => ErrorCategory::Job,
            RelayError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelayError::JobNotFinished { .. } => ErrorSeverity::Low,
            RelayError::Http(_)
            | RelayError::PollTimeout { .. }
            | RelayError::StreamTimeout { .. }
            | RelayError::AgentTimeout { .. } => ErrorSeverity::Medium,
            RelayError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Whether repeating the same request later has a reasonable chance to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Http(e) => e.is_timeout() || e.is_connect(),
            RelayError::ApiError { status, .. } => *status >= 500,
            RelayError::PollTimeout { .. }
            | RelayError::StreamTimeout { .. }
            | RelayError::AgentTimeout { .. } => true,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RelayError::Http(e) if e.is_connect() => {
                "Could not reach the backend. Is the relay server running?".to_string()
            }
            RelayError::Http(e) if e.is_timeout() => "The backend took too long to answer".to_string(),
            RelayError::PollTimeout { attempts } => {
                format!("The agent did not finish after {} status checks", attempts)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the backend URL and that the server is reachable",
            ErrorCategory::Configuration => "Review the configuration file and environment variables",
            ErrorCategory::Validation => "Check the input and try again",
            ErrorCategory::Agent => "Verify the agent CLI is installed and its credentials are valid",
            ErrorCategory::Job => "Submit the question again, or use streaming mode",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    /// Process exit code for the binaries, derived from the severity.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}
