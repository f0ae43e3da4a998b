use thiserror::Error;
use validator::ValidationErrors;

use crate::entities::InvalidRow;
use school_health_data::repository::RepositoryError;

/// Error returned by every domain service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record collides with an existing one
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or wrong credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Exam session is locked for the caller
    #[error("Exam session is locked: {0}")]
    Locked(String),

    /// Spreadsheet import rejected because some rows are unusable
    #[error("Import rejected: {message}")]
    InvalidImport {
        message: String,
        invalid_rows: Vec<InvalidRow>,
    },

    /// Storage failure
    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => ServiceError::NotFound(msg),
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            RepositoryError::Validation(msg) => ServiceError::Validation(msg),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(validation_message(&errors))
    }
}

/// Flatten validator errors into `field: msg; field: msg`
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<String>>()
        .join("; ")
}

/// Shorthand for a validation failure
pub(crate) fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(email(message = "Must be a valid email address"))]
        email: String,
        #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
        password: String,
    }

    #[test]
    fn test_validation_message_lists_fields_in_order() {
        let sample = Sample { email: "nope".to_string(), password: "short".to_string() };
        let err: ServiceError = sample.validate().unwrap_err().into();

        assert_eq!(
            err.to_string(),
            "Validation error: email: Must be a valid email address; password: Password must be at least 8 characters"
        );
    }

    #[test]
    fn test_repository_errors_keep_their_kind() {
        let err: ServiceError = RepositoryError::Conflict("email".to_string()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err: ServiceError = RepositoryError::NotFound("drug x".to_string()).into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
