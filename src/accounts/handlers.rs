use axum::{
    extract::{FromRef, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use super::{
    dto::{
        CloseAccountRequest, EditableProfile, LogoutQuery, LogoutResponse, ProfileUpdated,
        SignInRequest, SignInResponse, SignUpRequest, StatusMessage, SuccessMessage,
        UpdateProfileRequest,
    },
    pages,
    repo::StoreError,
    repo_types::{NewUser, ProfileChanges, Session, User, UserProfile},
    validation,
};
use crate::{
    auth::{cookies, password, AuthUser, ClientIp, JwtKeys},
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", get(pages::sign_up_form).post(sign_up))
        .route("/sign-in", get(pages::sign_in_form).post(sign_in))
        .route("/log-out", post(log_out))
        .route("/refresh", post(refresh))
        .route("/sign-out", delete(close_account))
        .route("/myInfo", get(my_info).patch(update_my_info))
        .route("/modmyInfo", get(editable_info))
}

fn reject(r: validation::Rejection) -> ApiError {
    warn!(reason = ?r, "input rejected");
    r.into()
}

/// Creates a session row and the cookie pair that points at it. The user's expired
/// sessions are dropped first.
async fn open_session(
    state: &AppState,
    user: &User,
    ip: Option<String>,
) -> ApiResult<(Session, HeaderMap)> {
    let keys = JwtKeys::from_ref(state);
    let purged = state
        .sessions
        .purge_expired(&user.id, OffsetDateTime::now_utc())
        .await?;
    if purged > 0 {
        debug!(user_id = %user.id, purged, "expired sessions purged");
    }
    let session = Session::issue(&user.id, ip, keys.refresh_ttl);
    let access = keys.sign_access(&user.id)?;
    let refresh = keys.sign_refresh(&user.email, &session)?;
    state.sessions.insert(&session).await?;
    let headers = cookies::session_pair(&state.config.cookies, &keys, &access, &refresh)?;
    Ok((session, headers))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<StatusMessage>)> {
    let form = validation::sign_up(&payload).map_err(reject)?;
    let password_hash = password::hash(&form.password)?;

    let profile = state
        .users
        .create(NewUser {
            id: form.id,
            email: form.email,
            password_hash,
            nickname: form.nickname,
            content: form.content,
        })
        .await
        .map_err(|e| {
            if let StoreError::Conflict(field) = &e {
                warn!(?field, "sign-up conflict");
            }
            ApiError::from(e)
        })?;

    info!(user_id = %profile.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(StatusMessage {
            status: StatusCode::CREATED.as_u16(),
            message: "sign-up complete, please sign in".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<SignInRequest>,
) -> ApiResult<(HeaderMap, Json<SignInResponse>)> {
    let (id, password) = validation::sign_in(&payload).map_err(reject)?;

    let user = state.users.find_by_id(id).await?.ok_or_else(|| {
        warn!(user_id = %id, "sign-in unknown id");
        ApiError::unauthorized("user does not exist")
    })?;

    if !password::verify(password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in wrong password");
        return Err(ApiError::unauthorized("password does not match"));
    }

    let (session, headers) = open_session(&state, &user, ip).await?;
    info!(user_id = %user.id, session_id = %session.id, "user signed in");
    Ok((
        headers,
        Json(SignInResponse {
            success: true,
            user: UserProfile::from(&user),
        }),
    ))
}

#[instrument(skip(state, user, headers), fields(user_id = %user.id))]
pub async fn log_out(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<LogoutQuery>,
    headers: HeaderMap,
) -> ApiResult<(HeaderMap, Json<LogoutResponse>)> {
    let is_success = if query.all {
        let revoked = state.sessions.revoke_all(&user.id).await?;
        info!(revoked, "all sessions revoked");
        state.sessions.list_for_user(&user.id).await?.is_empty()
    } else {
        let sid = cookies::read_bearer(&headers, cookies::REFRESH_COOKIE)
            .and_then(|t| JwtKeys::from_ref(&state).verify_refresh(&t).ok())
            .and_then(|claims| claims.sid);
        match sid {
            Some(sid) => {
                state.sessions.revoke(sid, &user.id).await?;
                info!(session_id = %sid, "session revoked");
                state.sessions.find(sid).await?.is_none()
            }
            None => true,
        }
    };

    let cleared = cookies::clear_session_pair(&state.config.cookies)?;
    Ok((cleared, Json(LogoutResponse { is_success })))
}

/// Trades a valid refresh cookie for a new token pair, rotating the session row.
#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> ApiResult<(HeaderMap, Json<SuccessMessage>)> {
    let keys = JwtKeys::from_ref(&state);
    let token = cookies::read_bearer(&headers, cookies::REFRESH_COOKIE)
        .ok_or_else(|| ApiError::unauthorized("refresh token required"))?;
    let claims = keys.verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "rejected refresh token");
        ApiError::unauthorized("invalid or expired refresh token")
    })?;
    let sid = claims
        .sid
        .ok_or_else(|| ApiError::unauthorized("invalid or expired refresh token"))?;

    let revoked = || ApiError::unauthorized("session is no longer valid");
    let session = state.sessions.find(sid).await?.ok_or_else(revoked)?;
    if session.is_expired(OffsetDateTime::now_utc()) {
        state.sessions.revoke(sid, &session.user_id).await?;
        return Err(revoked());
    }
    let user = state
        .users
        .find_by_id(&session.user_id)
        .await?
        .filter(|u| u.email == claims.sub)
        .ok_or_else(revoked)?;

    let next = Session::issue(&user.id, ip, keys.refresh_ttl);
    if !state.sessions.rotate(sid, &next).await? {
        warn!(session_id = %sid, "refresh raced with revocation");
        return Err(revoked());
    }
    let access = keys.sign_access(&user.id)?;
    let refresh = keys.sign_refresh(&user.email, &next)?;
    let set_cookies = cookies::session_pair(&state.config.cookies, &keys, &access, &refresh)?;

    info!(user_id = %user.id, session_id = %next.id, "session refreshed");
    Ok((set_cookies, Json(SuccessMessage::new("tokens refreshed"))))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn my_info(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn editable_info(AuthUser(user): AuthUser) -> Json<EditableProfile> {
    Json(EditableProfile {
        id: user.id,
        nickname: user.nickname,
        content: user.content,
    })
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_my_info(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<(StatusCode, Json<ProfileUpdated>)> {
    let password = validation::password_pair(
        payload.password.as_deref(),
        payload.password_check.as_deref(),
    )
    .map_err(reject)?;

    if !password::verify(password, &user.password_hash)? {
        warn!("profile update with wrong password");
        return Err(ApiError::unauthorized("password does not match"));
    }

    let changes = ProfileChanges {
        nickname: payload
            .nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        content: payload.content,
    };
    let profile = state
        .users
        .update_profile(&user.id, changes)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user does not exist"))?;

    info!("profile updated");
    Ok((
        StatusCode::CREATED,
        Json(ProfileUpdated {
            success: true,
            message: "profile updated".into(),
            user: profile,
        }),
    ))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn close_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CloseAccountRequest>,
) -> ApiResult<(HeaderMap, Json<SuccessMessage>)> {
    let password = validation::password(payload.password.as_deref()).map_err(reject)?;

    let current = state
        .users
        .find_by_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("no user with that id"))?;
    if !password::verify(password, &current.password_hash)? {
        warn!("account closure with wrong password");
        return Err(ApiError::unauthorized("password does not match"));
    }

    if !state.users.delete(&current.id).await? {
        return Err(ApiError::not_found("no user with that id"));
    }

    info!("account closed");
    let cleared = cookies::clear_session_pair(&state.config.cookies)?;
    Ok((cleared, Json(SuccessMessage::new("account deleted"))))
}
