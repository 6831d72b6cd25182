use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,                 // caller-chosen handle
    pub email: String,
    pub password_hash: String,      // argon2 PHC string, never serialized
    pub nickname: String,
    pub content: Option<String>,
    pub role: String,
    pub follow: Vec<String>,        // followed user ids
    pub is_email_valid: bool,
}

/// Public projection of a user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub content: Option<String>,
    pub role: String,
    pub follow: Vec<String>,
    pub is_email_valid: bool,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            nickname: u.nickname.clone(),
            content: u.content.clone(),
            role: u.role.clone(),
            follow: u.follow.clone(),
            is_email_valid: u.is_email_valid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub nickname: String,
    pub content: Option<String>,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub nickname: Option<String>,
    pub content: Option<String>,
}

/// One signed-in device. The refresh token names its row through the `sid` claim.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub ip: Option<String>,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn issue(user_id: &str, ip: Option<String>, ttl: std::time::Duration) -> Self {
        // Postgres keeps microseconds; truncate so stored and in-memory values compare equal.
        let now = OffsetDateTime::now_utc();
        let now = now
            .replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
            .unwrap_or(now);
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            ip,
            issued_at: now,
            expires_at: now + time::Duration::seconds(ttl.as_secs() as i64),
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}
