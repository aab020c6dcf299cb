// src/error.rs
use thiserror::Error;

/// Machine-readable error codes surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    Dependency,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Dependency => "DEPENDENCY_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Dependency => 502,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{message}: {}", .details.join("; "))]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Dependency(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MarketError {
    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    /// Single-detail validation failure.
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::validation("Validation Error", vec![detail.into()])
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::Validation,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Dependency(_) => ErrorCode::Dependency,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn details(&self) -> Vec<String> {
        match self {
            Self::Validation { details, .. } => details.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        Self::Internal(e.into())
    }
}
