//! Caller identity
//!
//! Authentication happens upstream; the proxy in front of the service sets
//! the `x-user-id` header. Handlers that act on behalf of a user extract
//! `CurrentUser`, handlers that only personalize take `Option<CurrentUser>`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::ApiError;

/// Header carrying the authenticated user id
pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", USER_HEADER)))?;

        let user = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("{} header is not valid text", USER_HEADER)))?
            .trim();

        if user.is_empty() {
            return Err(ApiError::Unauthorized(format!("{} header is empty", USER_HEADER)));
        }
        Ok(CurrentUser(user.to_string()))
    }
}
