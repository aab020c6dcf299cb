use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::ApiState;
use crate::error::MarketError;
use crate::users::Principal;

/// `Authorization: Bearer <token>`. No header means anonymous; a header
/// that does not resolve to a live user is rejected outright.
#[async_trait]
impl FromRequestParts<ApiState> for Principal {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Principal::Anonymous);
        };

        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or(MarketError::Unauthorized)?;

        let user = state
            .users
            .by_token(token)
            .await?
            .ok_or(MarketError::Unauthorized)?;

        Ok(Principal::from_user(Some(user)))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
