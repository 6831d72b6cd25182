//! In-memory store with the same uniqueness and cascade rules as the SQL schema.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{SessionRepo, StoreError, StoreResult, UniqueField, UserRepo};
use super::repo_types::{NewUser, ProfileChanges, Session, User, UserProfile};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    sessions: HashMap<Uuid, Session>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<UserProfile> {
        let mut t = self.tables.write().await;
        if t.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(UniqueField::Id));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        let row = User {
            id: user.id.clone(),
            email: user.email,
            password_hash: user.password_hash,
            nickname: user.nickname,
            content: user.content,
            role: "user".into(),
            follow: Vec::new(),
            is_email_valid: false,
        };
        let profile = UserProfile::from(&row);
        t.users.insert(user.id, row);
        Ok(profile)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn update_profile(
        &self,
        id: &str,
        changes: ProfileChanges,
    ) -> StoreResult<Option<UserProfile>> {
        let mut t = self.tables.write().await;
        let Some(user) = t.users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(nickname) = changes.nickname {
            user.nickname = nickname;
        }
        if let Some(content) = changes.content {
            user.content = Some(content);
        }
        Ok(Some(UserProfile::from(&*user)))
    }

    async fn mark_email_verified(&self, id: &str) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(id) {
            Some(user) if !user.is_email_valid => {
                user.is_email_valid = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.users.remove(id).is_some();
        t.sessions.retain(|_, s| s.user_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn insert(&self, session: &Session) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Session>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Session> = t
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(rows)
    }

    async fn rotate(&self, old: Uuid, next: &Session) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let owned = t.sessions.get(&old).is_some_and(|s| s.user_id == next.user_id);
        if owned {
            t.sessions.remove(&old);
            t.sessions.insert(next.id, next.clone());
        }
        Ok(owned)
    }

    async fn revoke(&self, id: Uuid, user_id: &str) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let owned = t.sessions.get(&id).is_some_and(|s| s.user_id == user_id);
        if owned {
            t.sessions.remove(&id);
        }
        Ok(owned)
    }

    async fn revoke_all(&self, user_id: &str) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.sessions.len();
        t.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - t.sessions.len()) as u64)
    }

    async fn purge_expired(&self, user_id: &str, now: OffsetDateTime) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.sessions.len();
        t.sessions
            .retain(|_, s| s.user_id != user_id || !s.is_expired(now));
        Ok((before - t.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn new_user(id: &str, email: &str) -> NewUser {
        NewUser {
            id: id.into(),
            email: email.into(),
            password_hash: "hash".into(),
            nickname: "nick".into(),
            content: None,
        }
    }

    #[tokio::test]
    async fn duplicates_are_rejected_per_field() {
        let store = MemoryStore::default();
        store.create(new_user("a", "a@x.com")).await.unwrap();
        assert!(matches!(
            store.create(new_user("a", "other@x.com")).await,
            Err(StoreError::Conflict(UniqueField::Id))
        ));
        assert!(matches!(
            store.create(new_user("b", "a@x.com")).await,
            Err(StoreError::Conflict(UniqueField::Email))
        ));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn deleting_a_user_drops_their_sessions() {
        let store = MemoryStore::default();
        store.create(new_user("a", "a@x.com")).await.unwrap();
        store.create(new_user("b", "b@x.com")).await.unwrap();
        let mine = Session::issue("a", None, Duration::from_secs(60));
        let theirs = Session::issue("b", None, Duration::from_secs(60));
        store.insert(&mine).await.unwrap();
        store.insert(&theirs).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(store.find(mine.id).await.unwrap().is_none());
        assert!(store.find(theirs.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rotate_and_revoke_respect_ownership() {
        let store = MemoryStore::default();
        let first = Session::issue("a", None, Duration::from_secs(60));
        store.insert(&first).await.unwrap();

        assert!(!store.revoke(first.id, "b").await.unwrap());
        let next = Session::issue("a", None, Duration::from_secs(60));
        assert!(store.rotate(first.id, &next).await.unwrap());
        assert!(!store.rotate(first.id, &next).await.unwrap());
        assert_eq!(store.list_for_user("a").await.unwrap(), vec![next.clone()]);
        assert_eq!(store.revoke_all("a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_drops_only_the_users_expired_sessions() {
        let store = MemoryStore::default();
        let stale = Session::issue("a", None, Duration::ZERO);
        let live = Session::issue("a", None, Duration::from_secs(60));
        let other_stale = Session::issue("b", None, Duration::ZERO);
        for s in [&stale, &live, &other_stale] {
            store.insert(s).await.unwrap();
        }

        let now = OffsetDateTime::now_utc();
        assert_eq!(store.purge_expired("a", now).await.unwrap(), 1);
        assert_eq!(store.list_for_user("a").await.unwrap(), vec![live]);
        assert!(store.find(other_stale.id).await.unwrap().is_some());
    }
}
