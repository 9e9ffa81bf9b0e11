//! Service layer error types
//!
//! Provides a unified error type for all engine operations.

use convo_core::DomainError;
use std::fmt;

use crate::coalescer::CoalesceError;

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Domain rule violation or store failure
    Domain(DomainError),

    /// Resource not found
    NotFound { resource: &'static str, id: String },

    /// Caller may not perform the action
    PermissionDenied { action: String },

    /// Input rejected before any store call
    Validation(String),

    /// Conflict (e.g., duplicate resource)
    Conflict(String),

    /// A newer call for the same key replaced this one
    Superseded,

    /// Internal error
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{e}"),
            Self::NotFound { resource, id } => write!(f, "{resource} not found: {id}"),
            Self::PermissionDenied { action } => write!(f, "Not allowed to {action}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Superseded => write!(f, "Superseded by a newer call"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Superseded calls are dropped on purpose and never shown
    #[inline]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    /// Rejected before reaching the store
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Domain(e) => e.is_validation(),
            _ => false,
        }
    }

    /// Get the error code for logs and notifications
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Superseded => "SUPERSEDED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The single notification text shown for a failed operation
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(e) if e.is_infrastructure() => {
                "Something went wrong. Please try again.".to_string()
            }
            Self::Domain(e) if e.is_authorization() => {
                "You don't have access to this conversation.".to_string()
            }
            Self::Domain(e) => e.to_string(),
            Self::NotFound { resource, .. } => format!("{resource} not found"),
            Self::PermissionDenied { .. } => "You don't have permission to do that.".to_string(),
            Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Superseded => String::new(),
            Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<CoalesceError<ServiceError>> for ServiceError {
    fn from(err: CoalesceError<ServiceError>) -> Self {
        match err {
            CoalesceError::Superseded => Self::Superseded,
            CoalesceError::Failed(e) => e,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| format!("{field} is invalid"), ToString::to_string)
                })
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
