//! Email ownership check: a short code is mailed out, and its hash rides in a signed
//! cookie bound to the requesting user.

use std::time::Duration;

use axum::{
    extract::{FromRef, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use rand::Rng;
use tracing::{error, info, instrument, warn};

use super::dto::{SuccessMessage, VerifyCodeRequest};
use crate::{
    auth::{cookies, password, AuthUser, JwtKeys},
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
};

const CODE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const CODE_LEN: usize = 6;

pub fn verification_routes() -> Router<AppState> {
    Router::new().route("/mail-check", get(send_code).post(confirm_code))
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn send_code(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<(HeaderMap, Json<SuccessMessage>)> {
    if user.is_email_valid {
        return Err(ApiError::unauthorized("email is already verified"));
    }

    let code = generate_code();
    let ttl_secs = state.config.cookies.auth_code_ttl_secs;
    let sealed = JwtKeys::from_ref(&state).sign_auth_code(
        &user.id,
        password::hash(&code)?,
        Duration::from_secs(ttl_secs.max(0) as u64),
    )?;

    if let Err(e) = state.mailer.send_verification(&user.email, &code).await {
        error!(error = %format!("{e:#}"), "verification mail failed");
        return Err(ApiError::MailDelivery(e));
    }

    let mut headers = HeaderMap::new();
    cookies::set(
        &mut headers,
        cookies::AUTH_CODE_COOKIE,
        sealed,
        ttl_secs,
        state.config.cookies.secure,
    )?;
    info!("verification code issued");
    Ok((headers, Json(SuccessMessage::new("verification mail sent"))))
}

#[instrument(skip(state, user, headers, payload), fields(user_id = %user.id))]
pub async fn confirm_code(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<VerifyCodeRequest>,
) -> ApiResult<(HeaderMap, Json<SuccessMessage>)> {
    let already = || ApiError::unauthorized("email is already verified");
    if user.is_email_valid {
        return Err(already());
    }

    let code = payload
        .auth_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::unauthorized("verification code is required"))?;

    let mismatch = || ApiError::unauthorized("verification code does not match");
    let sealed = cookies::read(&headers, cookies::AUTH_CODE_COOKIE).ok_or_else(mismatch)?;
    let claims = JwtKeys::from_ref(&state)
        .verify_auth_code(&sealed)
        .map_err(|e| {
            warn!(error = %e, "rejected verification cookie");
            mismatch()
        })?;
    if claims.sub != user.id {
        warn!("verification cookie issued to another user");
        return Err(mismatch());
    }
    let hashed = claims.code.as_deref().unwrap_or_default();
    // A malformed hash inside a valid token is still just a wrong code.
    if !password::verify(code, hashed).unwrap_or(false) {
        warn!("verification code mismatch");
        return Err(mismatch());
    }

    if !state.users.mark_email_verified(&user.id).await? {
        return Err(already());
    }

    let mut cleared = HeaderMap::new();
    cookies::clear(&mut cleared, cookies::AUTH_CODE_COOKIE, state.config.cookies.secure)?;
    info!("email verified");
    Ok((cleared, Json(SuccessMessage::new("email verified"))))
}
