// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-time verification codes, at most one pending code per chat user.

use crate::models::ChatId;
use crate::services::messaging::Messenger;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

const CODE_MIN: u32 = 100_000;
/// Number of distinct codes in `100000..=999999`.
const CODE_SPAN: u32 = 900_000;

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("System random generator unavailable")]
    Rng,
}

/// Pending verification codes keyed by chat user.
pub struct VerificationCodes {
    pending: DashMap<ChatId, String>,
    rng: SystemRandom,
    messenger: Arc<dyn Messenger>,
}

impl VerificationCodes {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self {
            pending: DashMap::new(),
            rng: SystemRandom::new(),
            messenger,
        }
    }

    /// Issue a fresh code for `id`, replacing any pending one, and hand it
    /// to the messenger for delivery to `phone`.
    ///
    /// Delivery runs in the background; if it fails the code stays valid.
    pub fn issue(&self, id: ChatId, phone: &str) -> Result<String, CodeError> {
        let code = self.generate()?;
        self.pending.insert(id, code.clone());
        tracing::debug!(chat_id = id, code = %code, "Verification code issued");

        let messenger = self.messenger.clone();
        let phone = phone.to_string();
        let text = format!("Ваш код подтверждения: {}", code);
        tokio::spawn(async move {
            if let Err(e) = messenger.send(&phone, &text).await {
                tracing::warn!(error = %e, chat_id = id, "Failed to deliver verification code");
            }
        });

        Ok(code)
    }

    /// Exact match against the pending code. A match consumes the code.
    pub fn verify(&self, id: ChatId, candidate: &str) -> bool {
        self.pending
            .remove_if(&id, |_, code| code == candidate)
            .is_some()
    }

    pub fn invalidate(&self, id: ChatId) {
        self.pending.remove(&id);
    }

    /// Currently pending code, if any.
    pub fn pending(&self, id: ChatId) -> Option<String> {
        self.pending.get(&id).map(|c| c.value().clone())
    }

    /// Uniform over `100000..=999999` (rejection sampling).
    fn generate(&self) -> Result<String, CodeError> {
        let zone = u32::MAX - (u32::MAX % CODE_SPAN);
        loop {
            let mut buf = [0u8; 4];
            self.rng.fill(&mut buf).map_err(|_| CodeError::Rng)?;
            let value = u32::from_le_bytes(buf);
            if value < zone {
                return Ok((CODE_MIN + value % CODE_SPAN).to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::messaging::RecordingMessenger;

    fn codes() -> (VerificationCodes, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::default());
        (VerificationCodes::new(messenger.clone()), messenger)
    }

    #[tokio::test]
    async fn test_generated_codes_are_six_digits() {
        let (codes, _) = codes();
        for _ in 0..500 {
            let code = codes.issue(1, "+7000").unwrap();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[tokio::test]
    async fn test_reissue_replaces_pending_code() {
        let (codes, _) = codes();
        let first = codes.issue(1, "+7000").unwrap();
        let mut second = codes.issue(1, "+7000").unwrap();
        while second == first {
            second = codes.issue(1, "+7000").unwrap();
        }

        assert!(!codes.verify(1, &first));
        assert!(codes.verify(1, &second));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_pending_and_right_code_is_single_use() {
        let (codes, _) = codes();
        let code = codes.issue(1, "+7000").unwrap();

        assert!(!codes.verify(1, "000000"));
        assert_eq!(codes.pending(1).as_deref(), Some(code.as_str()));

        assert!(codes.verify(1, &code));
        assert!(!codes.verify(1, &code));
        assert_eq!(codes.pending(1), None);
    }

    #[tokio::test]
    async fn test_codes_are_per_user() {
        let (codes, _) = codes();
        let code = codes.issue(1, "+7000").unwrap();
        assert!(!codes.verify(2, &code));
        codes.invalidate(1);
        assert!(!codes.verify(1, &code));
    }

    #[tokio::test]
    async fn test_issue_delivers_code_to_phone() {
        let (codes, messenger) = codes();
        let code = codes.issue(1, "+79991234567").unwrap();
        tokio::task::yield_now().await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+79991234567");
        assert!(sent[0].1.contains(&code));
    }
}
