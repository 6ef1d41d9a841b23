use thiserror::Error;

/// Coarse error taxonomy exposed to callers. Every `OrgError` collapses into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Error, Debug)]
pub enum OrgError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[cfg(feature = "postgres")]
    #[error("Storage error: {0}")]
    StorageError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

impl OrgError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrgError::Validation { .. } => ErrorKind::Validation,
            OrgError::NotFound { .. } => ErrorKind::NotFound,
            OrgError::Conflict { .. } => ErrorKind::Conflict,
            OrgError::ConfigError { .. }
            | OrgError::InvalidConfigValueError { .. }
            | OrgError::MissingConfigError { .. } => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }

    /// Message that is safe to hand to a caller. Internal failures never leak their cause.
    pub fn user_friendly_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            OrgError::ConfigError { .. }
            | OrgError::InvalidConfigValueError { .. }
            | OrgError::MissingConfigError { .. } => {
                "Check the command line flags, environment variables and config file"
            }
            #[cfg(feature = "postgres")]
            OrgError::StorageError(_) => "Check that the database is reachable and migrated (--migrate)",
            OrgError::IoError(_) => "Check file paths and permissions",
            _ => "Retry the operation; the request was rolled back",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrgError>;
