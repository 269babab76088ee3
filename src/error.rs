use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{identity::IdentityError, repository::RepositoryError, storage::StorageError};

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// FieldErrors
///
/// Field-level validation messages, rendered as `{"field": ["message", ...]}`.
/// A `BTreeMap` keeps the response body ordering stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an error set holding a single message for `field`.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Turns the collected messages into a result, `Ok` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
            first = false;
        }
        Ok(())
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                fields.add(&field, message);
            }
        }
        fields
    }
}

/// ApiError
///
/// The error taxonomy surfaced to API callers. Every handler returns
/// `Result<_, ApiError>` and relies on `?` to funnel lower-level failures here.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field-level or general input validation failure (400).
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The request body could not be accepted as submitted (400).
    #[error("{0}")]
    Parse(String),

    #[error("Not found.")]
    NotFound,

    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthorized,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ApiError {
    /// A validation error that is not attached to a specific field.
    pub fn non_field(message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(NON_FIELD_ERRORS, message))
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Parse(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Repository(RepositoryError::Conflict(_))
            | ApiError::Repository(RepositoryError::MissingReference(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Identity(IdentityError::Rejected(_)) => StatusCode::BAD_REQUEST,
            ApiError::Repository(_) | ApiError::Storage(_) | ApiError::Identity(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Repository(RepositoryError::Conflict(constraint)) => {
                tracing::warn!(%constraint, "constraint violation surfaced to caller");
                json!({ "non_field_errors": ["The submitted data conflicts with an existing record."] })
            }
            ApiError::Repository(RepositoryError::MissingReference(constraint)) => {
                tracing::warn!(%constraint, "dangling reference surfaced to caller");
                json!({ "non_field_errors": ["A referenced object does not exist."] })
            }
            ApiError::Identity(IdentityError::Rejected(reason)) => {
                json!({ "detail": format!("Registration rejected by the identity provider: {}", reason) })
            }
            ApiError::Repository(ref e) => {
                tracing::error!("repository error: {:?}", e);
                json!({ "detail": "Internal server error." })
            }
            ApiError::Storage(ref e) => {
                tracing::error!("storage error: {:?}", e);
                json!({ "detail": "Internal server error." })
            }
            ApiError::Identity(ref e) => {
                tracing::error!("identity provider error: {:?}", e);
                json!({ "detail": "Internal server error." })
            }
            other => json!({ "detail": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
