// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use loyalty_bot::config::Config;
use loyalty_bot::models::{CallbackKind, ChatId, Directive, InboundEvent, UserRecord, UserState};
use loyalty_bot::routes::create_router;
use loyalty_bot::services::{
    Collaborators, ConversationController, InMemoryCardRegistry, RecordingChatSender,
    RecordingMessenger, StaticMailDomains,
};
use loyalty_bot::store::{IdentityStore, InMemoryIdentityStore};
use loyalty_bot::AppState;
use std::sync::Arc;

/// Everything a test needs to drive and inspect the bot.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub registry: Arc<InMemoryCardRegistry>,
    pub messenger: Arc<RecordingMessenger>,
    pub chat: Arc<RecordingChatSender>,
}

impl TestApp {
    pub fn controller(&self) -> &ConversationController {
        &self.state.controller
    }

    pub async fn send(&self, id: ChatId, event: InboundEvent) -> Vec<Directive> {
        self.state.controller.handle(id, event).await
    }

    /// Text of the single reply to `event`.
    pub async fn send_text(&self, id: ChatId, body: &str) -> String {
        reply_text(&self.send(id, text(body)).await)
    }

    pub async fn user(&self, id: ChatId) -> Option<UserRecord> {
        self.state
            .controller
            .store()
            .get(id)
            .await
            .expect("store read failed")
    }

    pub async fn state_of(&self, id: ChatId) -> Option<UserState> {
        self.user(id).await.map(|u| u.state)
    }

    pub fn pending_code(&self, id: ChatId) -> String {
        self.state
            .controller
            .verification_codes()
            .pending(id)
            .expect("no pending code")
    }

    /// Drive a brand-new user from first contact to the code prompt.
    pub async fn submit_phone(&self, id: ChatId, phone: &str) {
        self.send(id, InboundEvent::Start).await;
        self.send(id, contact(phone)).await;
        assert_eq!(self.state_of(id).await, Some(UserState::AwaitingCode));
    }

    /// Full registration of a new customer.
    pub async fn register(&self, id: ChatId, phone: &str, name: &str, email: &str) {
        self.submit_phone(id, phone).await;
        let code = self.pending_code(id);
        self.send_text(id, &code).await;
        self.send_text(id, name).await;
        self.send_text(id, email).await;
        assert_eq!(self.state_of(id).await, Some(UserState::Authorized));
    }
}

/// Create a test app with in-memory collaborators.
/// Only `example.com` has a mail exchanger.
pub fn create_test_app() -> TestApp {
    let config = Config::test_default();
    let registry = Arc::new(InMemoryCardRegistry::new());
    let messenger = Arc::new(RecordingMessenger::default());
    let chat = Arc::new(RecordingChatSender::default());

    let controller = ConversationController::new(
        Collaborators {
            store: Arc::new(InMemoryIdentityStore::new()),
            registry: registry.clone(),
            messenger: messenger.clone(),
            mail_domains: Arc::new(StaticMailDomains::new(["example.com"])),
            chat: chat.clone(),
        },
        config.conversation_settings(),
    );

    let state = Arc::new(AppState { config, controller });

    TestApp {
        router: create_router(state.clone()),
        state,
        registry,
        messenger,
        chat,
    }
}

pub fn text(body: &str) -> InboundEvent {
    InboundEvent::Text {
        body: body.to_string(),
    }
}

pub fn contact(phone: &str) -> InboundEvent {
    InboundEvent::Contact {
        phone: phone.to_string(),
    }
}

pub fn button(kind: CallbackKind) -> InboundEvent {
    InboundEvent::Callback { kind }
}

/// Text of a single-reply response.
pub fn reply_text(directives: &[Directive]) -> String {
    assert_eq!(directives.len(), 1, "expected one directive: {:?}", directives);
    directives[0]
        .text()
        .expect("expected a text reply")
        .to_string()
}
