use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, TokenKind};
use crate::{accounts::repo_types::Session, config::JwtConfig, state::AppState};

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.ttl_minutes.max(0) as u64 * 60),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_minutes.max(0) as u64 * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn claims(&self, sub: &str, kind: TokenKind, ttl: Duration) -> Claims {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        Claims {
            sub: sub.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            ip: None,
            sid: None,
            code: None,
        }
    }

    fn encode(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::default(), claims, &self.encoding)?;
        debug!(kind = ?claims.kind, "jwt signed");
        Ok(token)
    }

    /// Short-lived token whose subject is the user id.
    pub fn sign_access(&self, user_id: &str) -> anyhow::Result<String> {
        self.encode(&self.claims(user_id, TokenKind::Access, self.access_ttl))
    }

    /// Long-lived token bound to a stored session.
    pub fn sign_refresh(&self, email: &str, session: &Session) -> anyhow::Result<String> {
        let mut claims = self.claims(email, TokenKind::Refresh, self.refresh_ttl);
        claims.ip = session.ip.clone();
        claims.sid = Some(session.id);
        self.encode(&claims)
    }

    /// Seals a verification code hash to one user for `ttl`.
    pub fn sign_auth_code(
        &self,
        user_id: &str,
        code_hash: String,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let mut claims = self.claims(user_id, TokenKind::AuthCode, ttl);
        claims.code = Some(code_hash);
        self.encode(&claims)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        if claims.sid.is_none() {
            anyhow::bail!("refresh token without session");
        }
        Ok(claims)
    }

    pub fn verify_auth_code(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::AuthCode {
            anyhow::bail!("not a verification token");
        }
        if claims.code.is_none() {
            anyhow::bail!("verification token without code");
        }
        Ok(claims)
    }
}
