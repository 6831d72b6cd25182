use anyhow::Context;
use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};

use super::jwt::JwtKeys;
use crate::config::CookieConfig;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const AUTH_CODE_COOKIE: &str = "authCode";

const BEARER: &str = "Bearer ";

fn header(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> anyhow::Result<HeaderValue> {
    let cookie = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age_secs))
        .build();
    HeaderValue::from_str(&cookie.encoded().to_string())
        .with_context(|| format!("build {name} cookie"))
}

pub fn set(
    headers: &mut HeaderMap,
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> anyhow::Result<()> {
    headers.append(SET_COOKIE, header(name, value, max_age_secs, secure)?);
    Ok(())
}

pub fn clear(headers: &mut HeaderMap, name: &'static str, secure: bool) -> anyhow::Result<()> {
    set(headers, name, String::new(), 0, secure)
}

/// `Set-Cookie` headers carrying both tokens, each prefixed with the bearer scheme.
pub fn session_pair(
    cfg: &CookieConfig,
    keys: &JwtKeys,
    access: &str,
    refresh: &str,
) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    set(
        &mut headers,
        ACCESS_COOKIE,
        format!("{BEARER}{access}"),
        keys.access_ttl.as_secs() as i64,
        cfg.secure,
    )?;
    set(
        &mut headers,
        REFRESH_COOKIE,
        format!("{BEARER}{refresh}"),
        keys.refresh_ttl.as_secs() as i64,
        cfg.secure,
    )?;
    Ok(headers)
}

pub fn clear_session_pair(cfg: &CookieConfig) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    clear(&mut headers, ACCESS_COOKIE, cfg.secure)?;
    clear(&mut headers, REFRESH_COOKIE, cfg.secure)?;
    Ok(headers)
}

/// Value of the named request cookie, percent-decoded.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|part| Cookie::parse_encoded(part.trim().to_string()).ok())
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

/// Token part of a `Bearer <token>` cookie value.
pub fn read_bearer(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = read(headers, name)?;
    value
        .strip_prefix(BEARER)
        .or_else(|| value.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
