use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, ProfileChanges, Session, User, UserProfile};

/// Which unique constraint an insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Id,
    Email,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    Conflict(UniqueField),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert and re-read the projection atomically. Duplicates surface as `Conflict`.
    async fn create(&self, user: NewUser) -> StoreResult<UserProfile>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    /// Apply changes and re-read the projection atomically; `None` if the row is gone.
    async fn update_profile(
        &self,
        id: &str,
        changes: ProfileChanges,
    ) -> StoreResult<Option<UserProfile>>;
    /// Returns false when the user is missing or already verified.
    async fn mark_email_verified(&self, id: &str) -> StoreResult<bool>;
    /// Removes the row and, with it, every session of the user.
    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn insert(&self, session: &Session) -> StoreResult<()>;
    async fn find(&self, id: Uuid) -> StoreResult<Option<Session>>;
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Session>>;
    /// Replace `old` with `next`; false if `old` was already gone.
    async fn rotate(&self, old: Uuid, next: &Session) -> StoreResult<bool>;
    async fn revoke(&self, id: Uuid, user_id: &str) -> StoreResult<bool>;
    async fn revoke_all(&self, user_id: &str) -> StoreResult<u64>;
    /// Drops the user's sessions that expired at or before `now`.
    async fn purge_expired(&self, user_id: &str, now: OffsetDateTime) -> StoreResult<u64>;
}

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_email_key") => UniqueField::Email,
                _ => UniqueField::Id,
            };
            return StoreError::Conflict(field);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create(&self, user: NewUser) -> StoreResult<UserProfile> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, nickname, content)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(&user.content)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, nickname, content, role, follow, is_email_valid
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(&user.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, nickname, content, role, follow,
                   is_email_valid
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: &str,
        changes: ProfileChanges,
    ) -> StoreResult<Option<UserProfile>> {
        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE users
               SET nickname = COALESCE($2, nickname),
                   content = COALESCE($3, content)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.nickname)
        .bind(&changes.content)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, nickname, content, role, follow, is_email_valid
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(profile))
    }

    async fn mark_email_verified(&self, id: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE users SET is_email_valid = TRUE WHERE id = $1 AND NOT is_email_valid",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionRepo for PgStore {
    async fn insert(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, ip, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id)
        .bind(&session.user_id)
        .bind(&session.ip)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, ip, issued_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(session)
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, ip, issued_at, expires_at
              FROM sessions
             WHERE user_id = $1
             ORDER BY issued_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn rotate(&self, old: Uuid, next: &Session) -> StoreResult<bool> {
        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("DELETE FROM sessions WHERE id = $1 AND user_id = $2")
            .bind(old)
            .bind(&next.user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, ip, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(next.id)
        .bind(&next.user_id)
        .bind(&next.ip)
        .bind(next.issued_at)
        .bind(next.expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn revoke(&self, id: Uuid, user_id: &str) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn revoke_all(&self, user_id: &str) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, user_id: &str, now: OffsetDateTime) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at <= $2")
            .bind(user_id)
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}
