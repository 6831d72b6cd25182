use std::{convert::Infallible, net::SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::{cookies, jwt::JwtKeys};
use crate::{accounts::repo_types::User, error::ApiError, state::AppState};

/// Loads the signed-in user from the `accessToken` cookie, falling back to an
/// `Authorization: Bearer` header.
pub struct AuthUser(pub User);

fn bearer_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookies::read_bearer(&parts.headers, cookies::ACCESS_COOKIE)
            .or_else(|| bearer_header(&parts.headers))
            .ok_or_else(|| ApiError::unauthorized("sign-in required"))?;

        let claims = JwtKeys::from_ref(state).verify_access(&token).map_err(|e| {
            warn!(error = %e, "rejected access token");
            ApiError::unauthorized("invalid or expired token")
        })?;

        let user = state
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for missing user");
                ApiError::unauthorized("user does not exist")
            })?;

        Ok(AuthUser(user))
    }
}

/// Best-effort address of the caller: proxy headers first when trusted, then the
/// socket peer.
pub struct ClientIp(pub Option<String>);

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let first = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    first("x-forwarded-for").or_else(|| first("x-real-ip"))
}

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forwarded = if state.config.trust_proxy_headers {
            forwarded_ip(&parts.headers)
        } else {
            None
        };
        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        Ok(ClientIp(ip))
    }
}
