// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat user record and conversation state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat-platform user identity (stable per user).
pub type ChatId = i64;

/// Where a user currently is in the registration / menu flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Unauthorized,
    AwaitingPhone,
    AwaitingCode,
    AwaitingName,
    AwaitingMail,
    /// Email-change sub-flow entered from the main menu.
    AwaitingMailAddress,
    Authorized,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Unauthorized => "unauthorized",
            UserState::AwaitingPhone => "awaiting_phone",
            UserState::AwaitingCode => "awaiting_code",
            UserState::AwaitingName => "awaiting_name",
            UserState::AwaitingMail => "awaiting_mail",
            UserState::AwaitingMailAddress => "awaiting_mail_address",
            UserState::Authorized => "authorized",
        }
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per chat identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Chat user ID (also the store key)
    pub id: ChatId,
    /// Display name, empty until known
    pub name: String,
    /// Phone number, empty until provided
    pub phone: String,
    /// Loyalty-card code; `None` until linked to a card
    pub code: Option<String>,
    pub state: UserState,
}

impl UserRecord {
    /// Fresh record as created on first contact.
    pub fn new(id: ChatId, name: &str, phone: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            phone: phone.to_string(),
            code: None,
            state: UserState::Unauthorized,
        }
    }

    /// Linked card code, ignoring empty strings.
    pub fn card_code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }
}

/// Partial update applied by `IdentityStore::reassign_id`.
///
/// `id` moves the record to a new key. `code` follows the same collision
/// rule as `set_code` (an empty string clears the link).
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub id: Option<ChatId>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub state: Option<UserState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&UserState::AwaitingMailAddress).unwrap();
        assert_eq!(json, "\"awaiting_mail_address\"");
        assert_eq!(UserState::AwaitingCode.to_string(), "awaiting_code");
    }

    #[test]
    fn test_card_code_ignores_empty() {
        let mut user = UserRecord::new(1, "", "");
        assert_eq!(user.card_code(), None);
        user.code = Some(String::new());
        assert_eq!(user.card_code(), None);
        user.code = Some("C1".to_string());
        assert_eq!(user.card_code(), Some("C1"));
    }
}
