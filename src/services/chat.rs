// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push channel back to the chat transport.
//!
//! Regular replies are returned from `ConversationController::handle`; this
//! is only for messages the bot sends on its own (code reminders).

use crate::models::{ChatId, Directive};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, chat_id: ChatId, directive: Directive) -> Result<(), ChatError>;
}

/// Logs pushed messages; used when no transport adapter is attached.
#[derive(Debug, Default, Clone)]
pub struct LoggingChatSender;

#[async_trait]
impl ChatSender for LoggingChatSender {
    async fn send(&self, chat_id: ChatId, directive: Directive) -> Result<(), ChatError> {
        tracing::info!(chat_id, directive = ?directive, "Chat push (logged, not sent)");
        Ok(())
    }
}

/// Collects pushed messages in memory.
#[derive(Debug, Default)]
pub struct RecordingChatSender {
    sent: Mutex<Vec<(ChatId, Directive)>>,
}

impl RecordingChatSender {
    pub fn sent(&self) -> Vec<(ChatId, Directive)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatSender for RecordingChatSender {
    async fn send(&self, chat_id: ChatId, directive: Directive) -> Result<(), ChatError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((chat_id, directive));
        }
        Ok(())
    }
}
