// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod card_registry;
pub mod chat;
pub mod conversation;
pub mod mail_domain;
pub mod messaging;
pub mod reminder;
pub mod replies;
pub mod validation;

pub use card_registry::{CardRegistry, InMemoryCardRegistry, RegistryError, StoredCard};
pub use chat::{ChatSender, LoggingChatSender, RecordingChatSender};
pub use conversation::{Collaborators, ConversationController, ConversationSettings};
pub use mail_domain::{DnsOverHttpsChecker, MailDomainChecker, StaticMailDomains};
pub use messaging::{LoggingMessenger, Messenger, RecordingMessenger};
pub use reminder::ReminderScheduler;
pub use validation::ValidationError;
