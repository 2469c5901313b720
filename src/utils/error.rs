use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("{service} failed: {message}")]
    ExternalServiceError { service: String, message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Credential vault error: {message}")]
    CredentialError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },
}

/// Buckets used by the UI to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Redirect to the login page.
    Auth,
    /// Warn and disable the feature.
    ExternalService,
    /// Fall back to session-only state.
    Storage,
    Configuration,
    Input,
    Internal,
}

impl AppError {
    pub fn external(service: &str, message: impl Into<String>) -> Self {
        AppError::ExternalServiceError {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AppError::StorageError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Unauthenticated | AppError::AuthError { .. } => ErrorCategory::Auth,
            AppError::HttpError(_) | AppError::ExternalServiceError { .. } => {
                ErrorCategory::ExternalService
            }
            AppError::StorageError { .. } => ErrorCategory::Storage,
            AppError::ConfigError { .. }
            | AppError::MissingConfigError { .. }
            | AppError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AppError::ValidationError { .. } | AppError::NotFound { .. } => ErrorCategory::Input,
            AppError::IoError(_)
            | AppError::SerializationError(_)
            | AppError::CsvError(_)
            | AppError::ZipError(_)
            | AppError::CredentialError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::Unauthenticated => "Please sign in to continue.".to_string(),
            AppError::AuthError { .. } => "Sign-in with Google did not complete.".to_string(),
            AppError::ExternalServiceError { service, message } => {
                format!("{} is unavailable right now: {}", service, message)
            }
            AppError::HttpError(_) => "A remote service could not be reached.".to_string(),
            AppError::StorageError { .. } => {
                "Google Drive could not be reached; changes are kept for this session only."
                    .to_string()
            }
            AppError::MissingConfigError { field } => {
                format!("The setting '{}' is required but missing.", field)
            }
            AppError::InvalidConfigValueError { field, reason, .. } => {
                format!("The setting '{}' is invalid: {}", field, reason)
            }
            AppError::ConfigError { message } => format!("Configuration problem: {}", message),
            AppError::ValidationError { message } => message.clone(),
            AppError::NotFound { what } => format!("{} could not be found.", what),
            _ => "Something went wrong while handling your request.".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Auth => "Sign in again with your Google account.",
            ErrorCategory::ExternalService => {
                "Check that Node.js is installed and your AnyList credentials are correct."
            }
            ErrorCategory::Storage => "Reconnect Google Drive from the Settings page.",
            ErrorCategory::Configuration => {
                "Check the configuration file and the environment variables it references."
            }
            ErrorCategory::Input => "Check the submitted values and try again.",
            ErrorCategory::Internal => "Try again; if the problem persists, check the server logs.",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_failure_buckets() {
        assert_eq!(AppError::Unauthenticated.category(), ErrorCategory::Auth);
        assert_eq!(
            AppError::external("AnyList", "timeout").category(),
            ErrorCategory::ExternalService
        );
        assert_eq!(AppError::storage("503").category(), ErrorCategory::Storage);
        assert_eq!(
            AppError::MissingConfigError {
                field: "auth.client_id".to_string()
            }
            .category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_user_friendly_message_names_the_service() {
        let err = AppError::external("AnyList", "Node.js is not available");
        assert_eq!(
            err.user_friendly_message(),
            "AnyList is unavailable right now: Node.js is not available"
        );
    }
}
