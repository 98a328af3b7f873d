// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Loyalty-card registry (the back-office customer system).
//!
//! The bot only needs the operations on `CardRegistry`. The production
//! registry speaks SOAP; that adapter lives outside this crate.
//! `InMemoryCardRegistry` backs local runs and tests.

use crate::models::{Balance, CardHolder, HistoryEntry, NewCard, QrImage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Card registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Card not found: {0}")]
    NotFound(String),

    #[error("Registry unavailable: {0}")]
    Transport(String),

    #[error("Registry rejected request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CardRegistry: Send + Sync {
    /// `Ok(None)` when no card is registered for the phone.
    async fn lookup_card_by_phone(&self, phone: &str)
        -> Result<Option<CardHolder>, RegistryError>;

    /// Open a card and return its code.
    async fn create_card(&self, card: NewCard) -> Result<String, RegistryError>;

    /// Update the contact details of the card registered for `phone`.
    /// An empty `email` leaves the stored one unchanged.
    async fn update_card_contact(
        &self,
        phone: &str,
        email: &str,
        external_ref: i64,
    ) -> Result<String, RegistryError>;

    async fn get_balance(&self, code: &str) -> Result<Balance, RegistryError>;

    /// Most recent entries first; `limit == 0` means no limit.
    async fn get_history(&self, code: &str, limit: usize)
        -> Result<Vec<HistoryEntry>, RegistryError>;

    async fn get_qr_image(&self, code: &str) -> Result<QrImage, RegistryError>;
}

/// Card as held by the in-memory registry.
#[derive(Debug, Clone)]
pub struct StoredCard {
    pub code: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub external_ref: i64,
    pub balance: Balance,
    pub history: Vec<HistoryEntry>,
    pub qr: Option<QrImage>,
}

impl StoredCard {
    pub fn new(code: &str, name: &str, phone: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            email: String::new(),
            external_ref: 0,
            balance: Balance {
                balance: 0.0,
                pending_deductions: Vec::new(),
            },
            history: Vec::new(),
            qr: None,
        }
    }
}

/// In-process registry. New cards are numbered `C100`, `C101`, ...
pub struct InMemoryCardRegistry {
    cards: RwLock<HashMap<String, StoredCard>>,
    next_code: AtomicU64,
    unavailable: AtomicBool,
}

impl Default for InMemoryCardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCardRegistry {
    pub fn new() -> Self {
        Self {
            cards: RwLock::new(HashMap::new()),
            next_code: AtomicU64::new(100),
            unavailable: AtomicBool::new(false),
        }
    }

    pub async fn insert(&self, card: StoredCard) {
        self.cards.write().await.insert(card.code.clone(), card);
    }

    pub async fn card(&self, code: &str) -> Option<StoredCard> {
        self.cards.read().await.get(code).cloned()
    }

    /// Make every call fail with `RegistryError::Transport`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Transport(
                "registry offline (simulated)".to_string(),
            ));
        }
        Ok(())
    }

    async fn with_card<T>(
        &self,
        code: &str,
        f: impl FnOnce(&StoredCard) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        self.check_available()?;
        let cards = self.cards.read().await;
        let card = cards
            .get(code)
            .ok_or_else(|| RegistryError::NotFound(code.to_string()))?;
        f(card)
    }
}

#[async_trait]
impl CardRegistry for InMemoryCardRegistry {
    async fn lookup_card_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<CardHolder>, RegistryError> {
        self.check_available()?;
        Ok(self
            .cards
            .read()
            .await
            .values()
            .find(|c| c.phone == phone)
            .map(|c| CardHolder {
                code: c.code.clone(),
                display_name: c.name.clone(),
            }))
    }

    async fn create_card(&self, card: NewCard) -> Result<String, RegistryError> {
        self.check_available()?;
        let mut cards = self.cards.write().await;
        if cards.values().any(|c| c.phone == card.phone) {
            return Err(RegistryError::Rejected(format!(
                "card already exists for {}",
                card.phone
            )));
        }

        let code = format!("C{}", self.next_code.fetch_add(1, Ordering::SeqCst));
        let mut stored = StoredCard::new(&code, &card.name, &card.phone);
        stored.email = card.email;
        stored.external_ref = card.external_ref;
        cards.insert(code.clone(), stored);

        tracing::info!(code = %code, "Card created");
        Ok(code)
    }

    async fn update_card_contact(
        &self,
        phone: &str,
        email: &str,
        external_ref: i64,
    ) -> Result<String, RegistryError> {
        self.check_available()?;
        let mut cards = self.cards.write().await;
        let card = cards
            .values_mut()
            .find(|c| c.phone == phone)
            .ok_or_else(|| RegistryError::NotFound(phone.to_string()))?;

        if !email.is_empty() {
            card.email = email.to_string();
        }
        card.external_ref = external_ref;
        Ok(card.code.clone())
    }

    async fn get_balance(&self, code: &str) -> Result<Balance, RegistryError> {
        self.with_card(code, |c| Ok(c.balance.clone())).await
    }

    async fn get_history(
        &self,
        code: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, RegistryError> {
        self.with_card(code, |c| {
            let mut entries = c.history.clone();
            entries.sort_by(|a, b| b.date.cmp(&a.date));
            if limit > 0 {
                entries.truncate(limit);
            }
            Ok(entries)
        })
        .await
    }

    async fn get_qr_image(&self, code: &str) -> Result<QrImage, RegistryError> {
        self.with_card(code, |c| {
            c.qr.clone()
                .ok_or_else(|| RegistryError::NotFound(format!("QR image for {}", code)))
        })
        .await
    }
}
