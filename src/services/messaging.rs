// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound SMS / notification delivery used for verification codes.

use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget text delivery to a phone number.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), MessagingError>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LoggingMessenger;

#[async_trait]
impl Messenger for LoggingMessenger {
    async fn send(&self, phone: &str, text: &str) -> Result<(), MessagingError> {
        tracing::info!(phone = %phone, text = %text, "SMS (logged, not sent)");
        Ok(())
    }
}

/// Keeps every message in memory. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingMessenger {
    /// `(phone, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, phone: &str, text: &str) -> Result<(), MessagingError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MessagingError::Delivery("gateway unavailable".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((phone.to_string(), text.to_string()));
        }
        Ok(())
    }
}
