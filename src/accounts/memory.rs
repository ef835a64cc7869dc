use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::accounts::repo::{StoreError, StoreResult, UserStore};
use crate::accounts::repo_types::{NewUser, User};

/// In-process `UserStore` with the same uniqueness and id rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store poisoned")))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        if inner.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(
            id,
            User {
                id,
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                last_seen: Some(user.last_seen),
                is_blocked: false,
            },
        );
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.rows.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.lock()?.rows.values().cloned().collect())
    }

    async fn touch_last_seen(&self, id: i64, at: OffsetDateTime) -> StoreResult<()> {
        if let Some(user) = self.lock()?.rows.get_mut(&id) {
            user.last_seen = Some(user.last_seen.map_or(at, |prev| prev.max(at)));
        }
        Ok(())
    }

    async fn set_blocked(&self, ids: &[i64], blocked: bool) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let mut matched = 0;
        for id in ids {
            if let Some(user) = inner.rows.get_mut(id) {
                user.is_blocked = blocked;
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete_many(&self, ids: &[i64]) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let mut removed = 0;
        for id in ids {
            if inner.rows.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Store whose every call fails, for exercising the 500 path.
pub struct FailingUserStore;

#[async_trait]
impl UserStore for FailingUserStore {
    async fn insert(&self, _user: NewUser) -> StoreResult<i64> {
        Err(anyhow::anyhow!("connection refused").into())
    }
    async fn find_by_email(&self, _email: &str) -> StoreResult<Option<User>> {
        Err(anyhow::anyhow!("connection refused").into())
    }
    async fn find_by_id(&self, _id: i64) -> StoreResult<Option<User>> {
        Err(anyhow::anyhow!("connection refused").into())
    }
    async fn list(&self) -> StoreResult<Vec<User>> {
        Err(anyhow::anyhow!("connection refused").into())
    }
    async fn touch_last_seen(&self, _id: i64, _at: OffsetDateTime) -> StoreResult<()> {
        Err(anyhow::anyhow!("connection refused").into())
    }
    async fn set_blocked(&self, _ids: &[i64], _blocked: bool) -> StoreResult<u64> {
        Err(anyhow::anyhow!("connection refused").into())
    }
    async fn delete_many(&self, _ids: &[i64]) -> StoreResult<u64> {
        Err(anyhow::anyhow!("connection refused").into())
    }
}

/// `MemoryUserStore` whose `touch_last_seen` stalls, then fails.
#[derive(Default)]
pub struct StalledTouchStore {
    inner: MemoryUserStore,
}

impl StalledTouchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for StalledTouchStore {
    async fn insert(&self, user: NewUser) -> StoreResult<i64> {
        self.inner.insert(user).await
    }
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_by_email(email).await
    }
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        self.inner.find_by_id(id).await
    }
    async fn list(&self) -> StoreResult<Vec<User>> {
        self.inner.list().await
    }
    async fn touch_last_seen(&self, _id: i64, _at: OffsetDateTime) -> StoreResult<()> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Err(anyhow::anyhow!("lock timeout").into())
    }
    async fn set_blocked(&self, ids: &[i64], blocked: bool) -> StoreResult<u64> {
        self.inner.set_blocked(ids, blocked).await
    }
    async fn delete_many(&self, ids: &[i64]) -> StoreResult<u64> {
        self.inner.delete_many(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn new_user(email: &str, at: OffsetDateTime) -> NewUser {
        NewUser {
            name: "A".into(),
            email: email.into(),
            password_hash: "$argon2id$v=19$stub".into(),
            last_seen: at,
        }
    }

    #[tokio::test]
    async fn touch_never_moves_last_seen_backwards() {
        let t0 = datetime!(2024-01-01 00:00:00 UTC);
        let t1 = datetime!(2024-01-02 00:00:00 UTC);
        let store = MemoryUserStore::new();
        let id = store.insert(new_user("a@x.com", t0)).await.unwrap();

        store.touch_last_seen(id, t1).await.unwrap();
        store.touch_last_seen(id, t0).await.unwrap();
        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.last_seen, Some(t1));
    }

    #[tokio::test]
    async fn insert_enforces_unique_email() {
        let store = MemoryUserStore::new();
        let at = datetime!(2024-01-01 00:00:00 UTC);
        assert_eq!(store.insert(new_user("a@x.com", at)).await.unwrap(), 1);
        assert!(matches!(
            store.insert(new_user("a@x.com", at)).await.unwrap_err(),
            StoreError::DuplicateEmail
        ));
        assert_eq!(store.insert(new_user("b@x.com", at)).await.unwrap(), 2);
    }
}
