// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity store keyed by chat user ID.
//!
//! Besides plain CRUD the store keeps the `code -> chat id` relation
//! injective: when a second identity is linked to a loyalty-card code that
//! another record already holds, the previous holder is evicted.

use crate::models::{ChatId, UserPatch, UserRecord, UserState};
use crate::store::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage for `UserRecord`s.
///
/// Every call is atomic with respect to the records it touches.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get(&self, id: ChatId) -> Result<Option<UserRecord>, StoreError>;

    /// Create the record (state `unauthorized`) or merge name and phone.
    /// Never touches `state` or `code`.
    async fn upsert(&self, id: ChatId, name: &str, phone: &str) -> Result<(), StoreError>;

    /// No-op when the record does not exist.
    async fn set_state(&self, id: ChatId, state: UserState) -> Result<(), StoreError>;

    /// Link `id` to a card code, evicting any other record holding it.
    /// An empty `code` clears the link. Returns the evicted identity.
    async fn set_code(&self, id: ChatId, code: &str) -> Result<Option<ChatId>, StoreError>;

    async fn remove(&self, id: ChatId) -> Result<Option<UserRecord>, StoreError>;

    /// Apply a field patch, moving the record if the patch changes its key.
    async fn reassign_id(&self, id: ChatId, patch: UserPatch) -> Result<(), StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<UserRecord>, StoreError>;
}

#[derive(Default)]
struct Inner {
    users: HashMap<ChatId, UserRecord>,
    /// Reverse index of non-empty card codes.
    codes: HashMap<String, ChatId>,
}

impl Inner {
    /// Current holder of `code`, checking the index against the records.
    fn holder_of(&self, code: &str) -> Result<Option<ChatId>, StoreError> {
        let Some(&holder) = self.codes.get(code) else {
            return Ok(None);
        };
        match self.users.get(&holder) {
            Some(user) if user.card_code() == Some(code) => Ok(Some(holder)),
            _ => Err(StoreError::InvariantViolation(format!(
                "code index points {} at chat {} which does not hold it",
                code, holder
            ))),
        }
    }

    /// Drop the index entry owned by `id`, if any.
    fn unlink(&mut self, id: ChatId) {
        let Some(code) = self
            .users
            .get(&id)
            .and_then(|u| u.card_code())
            .map(str::to_string)
        else {
            return;
        };
        if self.codes.get(&code) == Some(&id) {
            self.codes.remove(&code);
        }
    }

    fn evict(&mut self, id: ChatId) -> Option<UserRecord> {
        self.unlink(id);
        self.users.remove(&id)
    }

    /// Link `id` to `code`. Validates before mutating anything.
    /// Returns the identity whose record was evicted, if any.
    fn link(&mut self, id: ChatId, code: &str) -> Result<Option<ChatId>, StoreError> {
        if !self.users.contains_key(&id) {
            return Ok(None);
        }

        if code.is_empty() {
            self.unlink(id);
            if let Some(user) = self.users.get_mut(&id) {
                user.code = None;
            }
            return Ok(None);
        }

        let previous = self.holder_of(code)?.filter(|h| *h != id);

        if let Some(holder) = previous {
            self.evict(holder);
            tracing::info!(
                evicted_id = holder,
                new_id = id,
                code = %code,
                "Card code moved to another chat identity, previous record removed"
            );
        }

        self.unlink(id);
        self.codes.insert(code.to_string(), id);
        if let Some(user) = self.users.get_mut(&id) {
            user.code = Some(code.to_string());
        }
        Ok(previous)
    }
}

/// In-memory `IdentityStore`. Sessions do not survive a restart.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<Inner>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of all records (diagnostics and tests).
    pub async fn all(&self) -> Vec<UserRecord> {
        let mut users: Vec<_> = self.inner.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        users
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn get(&self, id: ChatId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn upsert(&self, id: ChatId, name: &str, phone: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .users
            .entry(id)
            .and_modify(|user| {
                user.name = name.to_string();
                user.phone = phone.to_string();
            })
            .or_insert_with(|| UserRecord::new(id, name, phone));
        Ok(())
    }

    async fn set_state(&self, id: ChatId, state: UserState) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().await.users.get_mut(&id) {
            tracing::debug!(chat_id = id, from = %user.state, to = %state, "State change");
            user.state = state;
        }
        Ok(())
    }

    async fn set_code(&self, id: ChatId, code: &str) -> Result<Option<ChatId>, StoreError> {
        self.inner.write().await.link(id, code)
    }

    async fn remove(&self, id: ChatId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.write().await.evict(id))
    }

    async fn reassign_id(&self, id: ChatId, patch: UserPatch) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let Some(mut user) = inner.users.get(&id).cloned() else {
            return Ok(());
        };
        let new_id = patch.id.unwrap_or(id);

        // Validate the index up front so a failure leaves everything intact.
        if let Some(code) = patch.code.as_deref().filter(|c| !c.is_empty()) {
            inner.holder_of(code)?;
        }
        if let Some(code) = user.card_code() {
            inner.holder_of(code)?;
        }

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(phone) = patch.phone {
            user.phone = phone;
        }
        if let Some(state) = patch.state {
            user.state = state;
        }

        if new_id != id {
            inner.evict(id);
            if let Some(replaced) = inner.evict(new_id) {
                tracing::info!(
                    from_id = id,
                    to_id = new_id,
                    replaced_state = %replaced.state,
                    "Re-keyed record replaces existing identity"
                );
            }
            user.id = new_id;
            if let Some(code) = user.card_code() {
                if let Some(holder) = inner.holder_of(code)? {
                    inner.evict(holder);
                }
                inner.codes.insert(code.to_string(), new_id);
            }
        }
        inner.users.insert(new_id, user);

        if let Some(code) = patch.code {
            inner.link(new_id, &code)?;
        }
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().await;
        let holder = inner.holder_of(code)?;
        Ok(holder.and_then(|id| inner.users.get(&id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "", "").await.unwrap();
        store.set_state(1, UserState::AwaitingPhone).await.unwrap();
        store.set_code(1, "C1").await.unwrap();

        store.upsert(1, "Анна", "+79991234567").await.unwrap();

        let user = store.get(1).await.unwrap().unwrap();
        assert_eq!(user.name, "Анна");
        assert_eq!(user.phone, "+79991234567");
        assert_eq!(user.state, UserState::AwaitingPhone);
        assert_eq!(user.code.as_deref(), Some("C1"));
    }

    #[tokio::test]
    async fn test_new_record_starts_unauthorized() {
        let store = InMemoryIdentityStore::new();
        store.upsert(7, "", "").await.unwrap();
        let user = store.get(7).await.unwrap().unwrap();
        assert_eq!(user.state, UserState::Unauthorized);
        assert_eq!(user.code, None);
    }

    #[tokio::test]
    async fn test_set_state_and_code_on_missing_record_are_noops() {
        let store = InMemoryIdentityStore::new();
        store.set_state(5, UserState::Authorized).await.unwrap();
        store.set_code(5, "C5").await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.find_by_code("C5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_code_evicts_previous_holder() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "Old", "+7000").await.unwrap();
        store.upsert(2, "New", "+7000").await.unwrap();
        assert_eq!(store.set_code(1, "C200").await.unwrap(), None);

        assert_eq!(store.set_code(2, "C200").await.unwrap(), Some(1));
        // Relinking the same holder evicts nobody
        assert_eq!(store.set_code(2, "C200").await.unwrap(), None);

        assert_eq!(store.get(1).await.unwrap(), None);
        let holder = store.find_by_code("C200").await.unwrap().unwrap();
        assert_eq!(holder.id, 2);
    }

    #[tokio::test]
    async fn test_relinking_releases_old_code() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "", "").await.unwrap();
        store.set_code(1, "A").await.unwrap();
        store.set_code(1, "B").await.unwrap();

        assert_eq!(store.find_by_code("A").await.unwrap(), None);
        assert_eq!(store.find_by_code("B").await.unwrap().unwrap().id, 1);

        store.upsert(2, "", "").await.unwrap();
        store.set_code(2, "A").await.unwrap();
        assert!(store.get(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_code_clears_link() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "", "").await.unwrap();
        store.set_code(1, "C1").await.unwrap();
        store.set_code(1, "").await.unwrap();

        assert_eq!(store.get(1).await.unwrap().unwrap().code, None);
        assert_eq!(store.find_by_code("C1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_releases_code() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "", "").await.unwrap();
        store.set_code(1, "C1").await.unwrap();

        let removed = store.remove(1).await.unwrap().unwrap();
        assert_eq!(removed.id, 1);
        assert_eq!(store.find_by_code("C1").await.unwrap(), None);
        assert_eq!(store.remove(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reassign_id_moves_record() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "Boris", "+7111").await.unwrap();
        store.set_code(1, "C200").await.unwrap();
        store.set_state(1, UserState::Authorized).await.unwrap();

        store
            .reassign_id(
                1,
                UserPatch {
                    id: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.get(1).await.unwrap(), None);
        let moved = store.get(10).await.unwrap().unwrap();
        assert_eq!(moved.id, 10);
        assert_eq!(moved.name, "Boris");
        assert_eq!(moved.state, UserState::Authorized);
        assert_eq!(store.find_by_code("C200").await.unwrap().unwrap().id, 10);
    }

    #[tokio::test]
    async fn test_reassign_id_onto_existing_identity_replaces_it() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "Provisional", "+7111").await.unwrap();
        store.upsert(2, "Stale", "+7222").await.unwrap();
        store.set_code(2, "C9").await.unwrap();

        store
            .reassign_id(
                1,
                UserPatch {
                    id: Some(2),
                    name: Some("Merged".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let merged = store.get(2).await.unwrap().unwrap();
        assert_eq!(merged.name, "Merged");
        assert_eq!(merged.code, None);
        assert_eq!(store.find_by_code("C9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reassign_id_patch_code_uses_collision_rule() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "", "").await.unwrap();
        store.upsert(2, "", "").await.unwrap();
        store.set_code(2, "C2").await.unwrap();

        store
            .reassign_id(
                1,
                UserPatch {
                    code: Some("C2".to_string()),
                    state: Some(UserState::Authorized),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.get(2).await.unwrap(), None);
        let user = store.get(1).await.unwrap().unwrap();
        assert_eq!(user.code.as_deref(), Some("C2"));
        assert_eq!(user.state, UserState::Authorized);
    }

    #[tokio::test]
    async fn test_corrupt_index_aborts_without_changes() {
        let store = InMemoryIdentityStore::new();
        store.upsert(1, "", "").await.unwrap();
        store.upsert(2, "", "").await.unwrap();
        // Index entry pointing at a record that does not hold the code.
        store.inner.write().await.codes.insert("C1".to_string(), 2);

        let err = store.set_code(1, "C1").await.unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation(_)));
        assert!(store.get(2).await.unwrap().is_some());
        assert_eq!(store.get(1).await.unwrap().unwrap().code, None);
    }

    #[tokio::test]
    async fn test_code_relation_stays_injective() {
        let store = InMemoryIdentityStore::new();
        for id in 1..=6 {
            store.upsert(id, "", "").await.unwrap();
        }
        let ops = [
            (1, "A"),
            (2, "B"),
            (3, "A"),
            (4, "B"),
            (5, "C"),
            (6, "A"),
            (5, ""),
            (4, "C"),
        ];
        for (id, code) in ops {
            store.set_code(id, code).await.unwrap();
        }

        let users = store.all().await;
        let mut seen = std::collections::HashSet::new();
        for user in &users {
            if let Some(code) = user.card_code() {
                assert!(seen.insert(code.to_string()), "code {} held twice", code);
            }
        }
        assert_eq!(store.find_by_code("A").await.unwrap().unwrap().id, 6);
        assert_eq!(store.find_by_code("C").await.unwrap().unwrap().id, 4);
    }
}
