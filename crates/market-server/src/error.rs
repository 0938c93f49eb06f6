//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use market_core::MarketError;
use market_payments::PaymentError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    Market(MarketError),
    /// No gateway credentials configured
    PaymentsDisabled,
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            // Retryable failures answer 5xx so the gateway redelivers webhooks
            Self::Market(err) if err.is_retryable() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Market(err) => match err {
                MarketError::NotFound(_) => StatusCode::NOT_FOUND,
                MarketError::Conflict(_) | MarketError::Validation(_) => StatusCode::BAD_REQUEST,
                MarketError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Market(err) => match err {
                MarketError::NotFound(_) => "NOT_FOUND",
                MarketError::Conflict(_) => "CONFLICT",
                MarketError::Validation(_) => "VALIDATION_ERROR",
                MarketError::Unauthorized(_) => "UNAUTHORIZED",
                MarketError::Forbidden(_) => "FORBIDDEN",
                MarketError::Gateway(_) => "GATEWAY_ERROR",
                MarketError::Storage(_) => "STORAGE_ERROR",
            },
            Self::PaymentsDisabled => "PAYMENTS_DISABLED",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Market(err) => err.user_message(),
            Self::PaymentsDisabled => "Payments not configured".into(),
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        Self::Market(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::Market(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = ?self, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                message: self.message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
