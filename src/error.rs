use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::{OrderId, UnavailableSeat};

/// Ошибки хранилища мест.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Сбой, после которого имеет смысл повторить всю операцию целиком:
    /// serialization failure, deadlock, таймаут пула, обрыв соединения.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            StoreError::Database(
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed,
            ) => true,
            StoreError::Database(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("order {0} cannot be paid in its current state")]
    OrderNotPayable(OrderId),
    #[error("seats unavailable")]
    Conflict(Vec<UnavailableSeat>),
    #[error("payment gateway error: {0}")]
    Gateway(#[from] crate::services::payment::GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReservationError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReservationError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ReservationError::Validation(_) => StatusCode::BAD_REQUEST,
            ReservationError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            ReservationError::OrderNotPayable(_) | ReservationError::Conflict(_) => StatusCode::CONFLICT,
            ReservationError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ReservationError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Нечитаемое тело запроса (не JSON, не тот тип поля, отрицательный срок брони)
/// отдаём тем же 400, что и ошибки валидации.
impl From<JsonRejection> for ReservationError {
    fn from(rejection: JsonRejection) -> Self {
        ReservationError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ReservationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ReservationError::Validation(errors.to_string())
    }
}

#[derive(Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unavailable: Option<Vec<UnavailableSeat>>,
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ReservationError::Conflict(unavailable) => ApiError {
                success: false,
                message: "Часть мест недоступна".to_string(),
                unavailable: Some(unavailable),
            },
            ReservationError::Store(e) => {
                tracing::error!("store failure: {:?}", e);
                ApiError {
                    success: false,
                    message: "Хранилище временно недоступно, повторите запрос".to_string(),
                    unavailable: None,
                }
            }
            ReservationError::Gateway(e) => {
                tracing::error!("payment gateway failure: {}", e);
                ApiError {
                    success: false,
                    message: "Ошибка платежного шлюза. Повторите попытку позже.".to_string(),
                    unavailable: None,
                }
            }
            other => ApiError { success: false, message: other.to_string(), unavailable: None },
        };
        (status, Json(body)).into_response()
    }
}
