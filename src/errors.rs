// ABOUTME: Unified error handling system with standard error codes and HTTP responses
// ABOUTME: Provides AppError/AppResult used across database, Cal.com client, and routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

//! # Error Handling
//!
//! Every operation in this crate returns [`AppResult`]; nothing throws across
//! the public boundary. Route handlers rely on the [`axum::response::IntoResponse`]
//! impl to turn an [`AppError`] into a JSON error payload with the mapped
//! HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing or invalid deployment configuration (client id/secret)
    ConfigError,
    /// Request payload failed validation
    InvalidInput,
    /// Requested record does not exist
    ResourceNotFound,
    /// Database operation failed
    DatabaseError,
    /// Upstream service returned an error
    ExternalServiceError,
    /// A token refresh for this user is already running
    RefreshInProgress,
    /// Too many refresh attempts inside the cooldown window
    RefreshLoopDetected,
    /// Unexpected internal failure
    InternalError,
}

impl ErrorCode {
    /// Map the error code to an HTTP status for route responses
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::ExternalServiceError => StatusCode::BAD_GATEWAY,
            Self::RefreshInProgress => StatusCode::SERVICE_UNAVAILABLE,
            Self::RefreshLoopDetected => StatusCode::TOO_MANY_REQUESTS,
            Self::ConfigError | Self::DatabaseError | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Application error carrying a code and a human-readable message
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable message, safe to surface to the front end
    pub message: String,
}

impl AppError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Configuration error (missing client credentials and similar)
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Input validation error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing record error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Error from an upstream service, prefixed with the service name
    pub fn external_service(service: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{service}: {}", message.into()),
        )
    }

    /// A refresh for this user is already in progress; callers retry later
    pub fn refresh_in_progress(user_ulid: &str) -> Self {
        Self::new(
            ErrorCode::RefreshInProgress,
            format!("Token refresh already in progress for user {user_ulid}"),
        )
    }

    /// Refresh attempts exceeded the ceiling inside the cooldown window
    pub fn refresh_loop(user_ulid: &str) -> Self {
        Self::new(
            ErrorCode::RefreshLoopDetected,
            format!("Suspected token refresh loop for user {user_ulid}, cooling down"),
        )
    }

    /// Unexpected internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Whether the caller should treat this error as transient and retry later
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::RefreshInProgress | ErrorCode::RefreshLoopDetected
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(format!("Database operation failed: {err}"))
    }
}

impl From<ulid::DecodeError> for AppError {
    fn from(err: ulid::DecodeError) -> Self {
        Self::invalid_input(format!("Invalid ULID: {err}"))
    }
}

/// Wire shape for error responses
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: ErrorCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.http_status();
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}
