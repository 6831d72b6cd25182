use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// SMTP relay used for verification mail.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
    pub auth_code_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub cookies: CookieConfig,
    /// Honour `X-Forwarded-For` / `X-Real-IP`; only safe behind a proxy that sets them.
    pub trust_proxy_headers: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accounts".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accounts-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 12),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 168),
        };

        let user = std::env::var("MAIL_USER").context("MAIL_USER is not set")?;
        let mail = MailConfig {
            host: std::env::var("MAIL_HOST").unwrap_or_else(|_| "smtp.naver.com".into()),
            port: env_or("MAIL_PORT", 587),
            password: std::env::var("MAIL_PASS").context("MAIL_PASS is not set")?,
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| user.clone()),
            user,
        };

        let cookies = CookieConfig {
            secure: env_or("COOKIE_SECURE", false),
            auth_code_ttl_secs: env_or("VERIFICATION_CODE_TTL_SECS", 3600),
        };

        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            mail,
            cookies,
            trust_proxy_headers: env_or("TRUST_PROXY_HEADERS", false),
        })
    }
}
