use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

use crate::models::HolderToken;

pub const SESSION_HEADER: &str = "x-session-id";

const MAX_SESSION_LEN: usize = 128;

/// Необязательный токен покупателя из заголовка `X-Session-Id`.
/// Брони без токена работают как раньше: их может снять любой.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHolder(pub Option<HolderToken>);

impl SessionHolder {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn parse_session(value: &str) -> Result<Option<HolderToken>, StatusCode> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.len() > MAX_SESSION_LEN || !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Some(value.to_string()))
}

impl FromRequestParts<Arc<crate::AppState>> for SessionHolder {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(SESSION_HEADER) else {
            return Ok(SessionHolder(None));
        };
        let value = header.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
        parse_session(value).map(SessionHolder)
    }
}
