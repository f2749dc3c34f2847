use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("object type `{object_type}` does not declare sub-type `{sub_type}`")]
    UnknownSubType {
        object_type: String,
        sub_type: String,
    },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn unknown_sub_type(object_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self::UnknownSubType {
            object_type: object_type.into(),
            sub_type: sub_type.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
