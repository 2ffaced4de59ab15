use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response}
};

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {

    #[error("Database query failed: {0}")]
    DatabaseError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unexpected server error")]
    Unexpected,
}

impl AppError {

    pub fn database<T: Into<String>>(msg: T) -> Self {
        AppError::DatabaseError(msg.into())
    }

    pub fn bad_request<T: Into<String>>(msg: T) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn precondition<T: Into<String>>(msg: T) -> Self {
        AppError::PreconditionFailed(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        AppError::ValidationError(msg.into())
    }

}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(_: bcrypt::BcryptError) -> Self {
        AppError::Unexpected
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::Unexpected
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let joined = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"))
                })
            })
            .collect::<Vec<_>>()
            .join(", ");
        AppError::ValidationError(joined)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {

        // validation keeps the field-level messages in a separate field
        if let AppError::ValidationError(errors) = &self {
            let body = Json(json!({
                "status": "error",
                "message": "Validation failed",
                "errors": errors
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, message) = match &self {
            AppError::DatabaseError(msg) => {
                tracing::error!(error = %msg, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),

            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),

            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),

            AppError::PreconditionFailed(msg) => (StatusCode::PRECONDITION_FAILED, msg.clone()),

            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            AppError::Unexpected => {
                tracing::error!("unexpected server error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message
        }));

        (status, body).into_response()
    }
}
