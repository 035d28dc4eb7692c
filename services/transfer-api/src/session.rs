//! Caller identity, resolved upstream and forwarded as headers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::TransferError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const COUNTRY_HEADER: &str = "x-country";
pub const DEVICE_ID_HEADER: &str = "x-device-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    /// Country the request claims to come from.
    pub country: Option<String>,
    pub device_id: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = TransferError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).ok_or(TransferError::Unauthorized)?;
        Ok(Self {
            user_id,
            country: header(parts, COUNTRY_HEADER),
            device_id: header(parts, DEVICE_ID_HEADER),
        })
    }
}
