use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::store::OwnerId;

/// Header carrying the authenticated user's id, set by the auth proxy.
pub const USER_HEADER: &str = "x-user-id";

/// The user every record operation is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Owner)
            .ok_or(AppError::Unauthorized)
    }
}
