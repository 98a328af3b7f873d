// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation controller: the registration / login state machine and the
//! authorized-user menu.
//!
//! Handles:
//! - First contact and phone entry (with card lookup)
//! - One-time code verification with a bounded number of attempts
//! - New-customer registration (name, email, card creation)
//! - Menu reads (balance, QR image, history) and the email-change flow
//! - Deferred code reminders
//!
//! Events for the same chat user are processed one at a time; events for
//! different users run concurrently.

use crate::models::{
    CallbackKind, ChatId, Directive, InboundEvent, Keyboard, NewCard, UserRecord, UserState,
};
use crate::services::card_registry::CardRegistry;
use crate::services::chat::ChatSender;
use crate::services::mail_domain::MailDomainChecker;
use crate::services::messaging::Messenger;
use crate::services::reminder::ReminderScheduler;
use crate::services::replies;
use crate::services::validation::{self, ValidationError};
use crate::store::{AttemptLimiter, CodeError, IdentityStore, StoreError, VerificationCodes};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default delay before re-prompting for a pending code.
pub const DEFAULT_REMINDER_DELAY_SECS: u64 = 60;
/// Default number of history entries shown.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Tunables for the controller.
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub reminder_delay: Duration,
    pub history_limit: usize,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            reminder_delay: Duration::from_secs(DEFAULT_REMINDER_DELAY_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// External collaborators the controller talks to.
pub struct Collaborators {
    pub store: Arc<dyn IdentityStore>,
    pub registry: Arc<dyn CardRegistry>,
    pub messenger: Arc<dyn Messenger>,
    pub mail_domains: Arc<dyn MailDomainChecker>,
    pub chat: Arc<dyn ChatSender>,
}

/// Result of checking a submitted verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyOutcome {
    Accepted,
    Rejected { remaining: u32 },
    /// Limit reached; the pending code is gone and the counter cleared.
    LockedOut,
}

/// Per-user locks serializing event handling.
type UserLocks = DashMap<ChatId, Arc<Mutex<()>>>;

struct Inner {
    store: Arc<dyn IdentityStore>,
    registry: Arc<dyn CardRegistry>,
    mail_domains: Arc<dyn MailDomainChecker>,
    chat: Arc<dyn ChatSender>,
    codes: VerificationCodes,
    attempts: AttemptLimiter,
    reminders: ReminderScheduler,
    locks: UserLocks,
    settings: ConversationSettings,
}

/// The state machine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ConversationController {
    inner: Arc<Inner>,
}

fn reply(text: impl Into<String>, keyboard: Keyboard) -> Vec<Directive> {
    vec![Directive::reply(text, keyboard)]
}

impl ConversationController {
    pub fn new(collaborators: Collaborators, settings: ConversationSettings) -> Self {
        let Collaborators {
            store,
            registry,
            messenger,
            mail_domains,
            chat,
        } = collaborators;

        Self {
            inner: Arc::new(Inner {
                store,
                registry,
                mail_domains,
                chat,
                codes: VerificationCodes::new(messenger),
                attempts: AttemptLimiter::new(),
                reminders: ReminderScheduler::new(),
                locks: DashMap::new(),
                settings,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.inner.store
    }

    pub fn verification_codes(&self) -> &VerificationCodes {
        &self.inner.codes
    }

    pub fn attempts(&self) -> &AttemptLimiter {
        &self.inner.attempts
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.inner.reminders
    }

    /// Process one inbound event and return what to send back.
    ///
    /// Never fails: store errors abort the transition and produce a
    /// generic error reply.
    pub async fn handle(&self, id: ChatId, event: InboundEvent) -> Vec<Directive> {
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        match self.dispatch(id, event).await {
            Ok(directives) => directives,
            Err(e) => {
                tracing::error!(error = %e, chat_id = id, "Transition aborted");
                reply(replies::INTERNAL_ERROR, Keyboard::Keep)
            }
        }
    }

    fn user_lock(&self, id: ChatId) -> Arc<Mutex<()>> {
        self.inner
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn dispatch(&self, id: ChatId, event: InboundEvent) -> Result<Vec<Directive>, StoreError> {
        let store = &self.inner.store;

        let Some(user) = store.get(id).await? else {
            if event == InboundEvent::Logout {
                return Ok(reply(replies::NOT_AUTHORIZED, Keyboard::Remove));
            }

            store.upsert(id, "", "").await?;
            store.set_state(id, UserState::AwaitingPhone).await?;
            tracing::info!(chat_id = id, "New chat user");

            return match event {
                InboundEvent::Contact { phone } => self.submit_phone(id, &phone).await,
                _ => Ok(reply(replies::WELCOME, Keyboard::RequestPhone)),
            };
        };

        tracing::debug!(chat_id = id, state = %user.state, event = ?event, "Handling event");

        match event {
            InboundEvent::Start => self.on_start(&user).await,
            InboundEvent::Logout => self.on_logout(&user).await,
            InboundEvent::Contact { phone } => self.on_contact(&user, &phone).await,
            InboundEvent::Text { body } => match button_for(user.state, &body) {
                Some(kind) => self.on_button(&user, kind).await,
                None => self.on_text(&user, &body).await,
            },
            InboundEvent::Callback { kind } => self.on_button(&user, kind).await,
        }
    }

    // ─── Event handlers ──────────────────────────────────────────

    async fn on_start(&self, user: &UserRecord) -> Result<Vec<Directive>, StoreError> {
        match user.state {
            UserState::Unauthorized => {
                self.inner
                    .store
                    .set_state(user.id, UserState::AwaitingPhone)
                    .await?;
                Ok(reply(replies::WELCOME, Keyboard::RequestPhone))
            }
            UserState::Authorized => Ok(reply(replies::WELCOME_BACK, Keyboard::MainMenu)),
            _ => Ok(prompt_for(user.state)),
        }
    }

    async fn on_logout(&self, user: &UserRecord) -> Result<Vec<Directive>, StoreError> {
        if !is_signed_in(user.state) {
            return Ok(reply(replies::NOT_AUTHORIZED, Keyboard::Keep));
        }
        self.logout(user).await
    }

    async fn on_contact(&self, user: &UserRecord, phone: &str) -> Result<Vec<Directive>, StoreError> {
        match user.state {
            UserState::AwaitingPhone => self.submit_phone(user.id, phone).await,
            state => Ok(prompt_for(state)),
        }
    }

    async fn on_text(&self, user: &UserRecord, body: &str) -> Result<Vec<Directive>, StoreError> {
        match user.state {
            UserState::Unauthorized => Ok(reply(replies::START_OVER, Keyboard::Remove)),
            UserState::AwaitingPhone => self.submit_phone(user.id, body).await,
            UserState::AwaitingCode => self.submit_code(user, body).await,
            UserState::AwaitingName => self.submit_name(user, body).await,
            UserState::AwaitingMail => self.submit_mail(user, body).await,
            UserState::AwaitingMailAddress => self.submit_new_mail(user, body).await,
            UserState::Authorized => Ok(reply(replies::MENU, Keyboard::MainMenu)),
        }
    }

    async fn on_button(&self, user: &UserRecord, kind: CallbackKind) -> Result<Vec<Directive>, StoreError> {
        let store = &self.inner.store;

        match (user.state, kind) {
            (UserState::AwaitingCode, CallbackKind::ChangePhone) => self.change_phone(user).await,
            (UserState::AwaitingCode, CallbackKind::ResendCode) => self.resend_code(user).await,
            (UserState::Authorized, CallbackKind::Balance) => Ok(self.show_balance(user).await),
            (UserState::Authorized, CallbackKind::QrCode) => Ok(self.show_qr(user).await),
            (UserState::Authorized, CallbackKind::History) => Ok(self.show_history(user).await),
            (UserState::Authorized, CallbackKind::ChangeMail) => {
                store
                    .set_state(user.id, UserState::AwaitingMailAddress)
                    .await?;
                Ok(reply(replies::ASK_NEW_MAIL, Keyboard::BackToMenu))
            }
            (UserState::Authorized | UserState::AwaitingMailAddress, CallbackKind::Logout) => {
                self.logout(user).await
            }
            (UserState::AwaitingMailAddress, CallbackKind::Back) => {
                store.set_state(user.id, UserState::Authorized).await?;
                Ok(reply(replies::MENU, Keyboard::MainMenu))
            }
            (state, _) => Ok(prompt_for(state)),
        }
    }

    // ─── Phone and code ──────────────────────────────────────────

    /// Link `id` to a card. An identity evicted by the link loses its
    /// pending code, attempt count and reminder along with its record.
    async fn link_card(&self, id: ChatId, code: &str) -> Result<(), StoreError> {
        if let Some(evicted) = self.inner.store.set_code(id, code).await? {
            tracing::info!(chat_id = id, evicted_id = evicted, "Clearing session of evicted identity");
            self.forget_session(evicted);
        }
        Ok(())
    }

    /// Drop pending code, failure count and reminder for `id`.
    fn forget_session(&self, id: ChatId) {
        self.inner.codes.invalidate(id);
        self.inner.attempts.reset(id);
        self.inner.reminders.cancel(id);
    }

    /// Phone entry: look the card up, link it if found, and send a code.
    async fn submit_phone(&self, id: ChatId, input: &str) -> Result<Vec<Directive>, StoreError> {
        let phone = match validation::validate_phone(input) {
            Ok(phone) => phone,
            Err(_) => return Ok(reply(replies::INVALID_PHONE, Keyboard::RequestPhone)),
        };
        let store = &self.inner.store;

        // A registry failure is treated like a miss: the user can still
        // register, and card creation will surface the outage later.
        let holder = match self.inner.registry.lookup_card_by_phone(phone).await {
            Ok(holder) => holder,
            Err(e) => {
                tracing::warn!(error = %e, chat_id = id, "Card lookup failed, continuing as new customer");
                None
            }
        };
        let existing_card = holder.is_some();

        match holder {
            Some(card) => {
                // Link first so a store inconsistency aborts before other writes.
                self.link_card(id, &card.code).await?;
                store.upsert(id, &card.display_name, phone).await?;
                tracing::info!(chat_id = id, code = %card.code, "Existing card found for phone");
            }
            None => {
                store.set_code(id, "").await?;
                store.upsert(id, "", phone).await?;
                tracing::info!(chat_id = id, "No card for phone, starting registration");
            }
        }

        self.inner.attempts.reset(id);
        if let Err(e) = self.send_code(id, phone) {
            tracing::error!(error = %e, chat_id = id, "Failed to issue verification code");
            return Ok(reply(replies::SERVICE_UNAVAILABLE, Keyboard::RequestPhone));
        }
        store.set_state(id, UserState::AwaitingCode).await?;

        Ok(reply(
            replies::code_sent(phone, existing_card),
            Keyboard::CodeControls,
        ))
    }

    /// Check a submitted code, counting failures toward the lockout.
    fn check_code(&self, id: ChatId, input: &str) -> VerifyOutcome {
        let inner = &self.inner;
        if inner.codes.verify(id, input.trim()) {
            inner.attempts.reset(id);
            return VerifyOutcome::Accepted;
        }
        match inner.attempts.record_failure(id) {
            0 => {
                inner.attempts.reset(id);
                inner.codes.invalidate(id);
                VerifyOutcome::LockedOut
            }
            remaining => VerifyOutcome::Rejected { remaining },
        }
    }

    async fn submit_code(&self, user: &UserRecord, input: &str) -> Result<Vec<Directive>, StoreError> {
        let id = user.id;
        let inner = &self.inner;

        match self.check_code(id, input) {
            VerifyOutcome::Accepted => {
                inner.reminders.cancel(id);

                if user.card_code().is_some() {
                    inner.store.set_state(id, UserState::Authorized).await?;
                    tracing::info!(chat_id = id, "Returning customer authorized");

                    if let Err(e) = inner.registry.update_card_contact(&user.phone, "", id).await {
                        tracing::warn!(error = %e, chat_id = id, "Contact update after login failed (ignored)");
                    }
                    return Ok(reply(replies::CODE_ACCEPTED, Keyboard::MainMenu));
                }

                inner.store.set_state(id, UserState::AwaitingName).await?;
                Ok(reply(replies::ASK_NAME, Keyboard::Remove))
            }
            VerifyOutcome::Rejected { remaining } => {
                tracing::info!(chat_id = id, remaining, "Wrong verification code");
                Ok(reply(replies::wrong_code(remaining), Keyboard::CodeControls))
            }
            VerifyOutcome::LockedOut => {
                tracing::warn!(chat_id = id, "Verification attempts exhausted, back to phone entry");
                inner.reminders.cancel(id);
                inner.store.set_state(id, UserState::AwaitingPhone).await?;
                Ok(reply(replies::LOCKOUT, Keyboard::RequestPhone))
            }
        }
    }

    async fn change_phone(&self, user: &UserRecord) -> Result<Vec<Directive>, StoreError> {
        let store = &self.inner.store;
        store.set_code(user.id, "").await?;
        store.upsert(user.id, &user.name, "").await?;
        self.forget_session(user.id);
        store.set_state(user.id, UserState::AwaitingPhone).await?;
        Ok(reply(replies::CHANGE_PHONE, Keyboard::RequestPhone))
    }

    async fn resend_code(&self, user: &UserRecord) -> Result<Vec<Directive>, StoreError> {
        self.inner.attempts.reset(user.id);
        if let Err(e) = self.send_code(user.id, &user.phone) {
            tracing::error!(error = %e, chat_id = user.id, "Failed to reissue verification code");
            return Ok(reply(replies::SERVICE_UNAVAILABLE, Keyboard::CodeControls));
        }
        Ok(reply(replies::CODE_RESENT, Keyboard::CodeControls))
    }

    fn send_code(&self, id: ChatId, phone: &str) -> Result<(), CodeError> {
        self.inner.codes.issue(id, phone)?;
        self.schedule_reminder(id);
        Ok(())
    }

    fn schedule_reminder(&self, id: ChatId) {
        let controller = self.clone();
        self.inner.reminders.schedule(
            id,
            UserState::AwaitingCode,
            self.inner.settings.reminder_delay,
            move |generation| async move { controller.remind(id, generation).await },
        );
    }

    /// Deferred re-prompt. Acts only if this reminder is still the current
    /// one and the user is still in the state it was scheduled for.
    async fn remind(&self, id: ChatId, generation: u64) {
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        let Some(expected) = self.inner.reminders.claim(id, generation) else {
            tracing::debug!(chat_id = id, "Reminder superseded");
            return;
        };

        match self.inner.store.get(id).await {
            Ok(Some(user)) if user.state == expected => {
                let directive = Directive::reply(replies::CODE_REMINDER, Keyboard::CodeControls);
                match self.inner.chat.send(id, directive).await {
                    Ok(()) => tracing::info!(chat_id = id, "Code reminder sent"),
                    Err(e) => tracing::warn!(error = %e, chat_id = id, "Code reminder failed"),
                }
            }
            Ok(_) => tracing::debug!(chat_id = id, "Reminder skipped, state moved on"),
            Err(e) => tracing::error!(error = %e, chat_id = id, "Reminder could not read state"),
        }
    }

    // ─── Registration ────────────────────────────────────────────

    async fn submit_name(&self, user: &UserRecord, input: &str) -> Result<Vec<Directive>, StoreError> {
        let name = match validation::validate_name(input) {
            Ok(name) => name,
            Err(_) => return Ok(reply(replies::INVALID_NAME, Keyboard::Keep)),
        };
        self.inner.store.upsert(user.id, name, &user.phone).await?;
        self.inner
            .store
            .set_state(user.id, UserState::AwaitingMail)
            .await?;
        Ok(reply(replies::ask_mail(name), Keyboard::Remove))
    }

    /// Syntax check plus MX lookup. Resolver failures count as "no MX".
    async fn check_email<'a>(&self, input: &'a str) -> Result<&'a str, ValidationError> {
        let email = validation::validate_email_syntax(input)?;
        let domain = validation::email_domain(email).ok_or(ValidationError::InvalidEmail)?;

        match self.inner.mail_domains.has_mail_exchange(domain).await {
            Ok(true) => Ok(email),
            Ok(false) => Err(ValidationError::NoMailExchange),
            Err(e) => {
                tracing::warn!(error = %e, domain = %domain, "MX lookup failed");
                Err(ValidationError::NoMailExchange)
            }
        }
    }

    async fn submit_mail(&self, user: &UserRecord, input: &str) -> Result<Vec<Directive>, StoreError> {
        let email = match self.check_email(input).await {
            Ok(email) => email,
            Err(e) => {
                tracing::debug!(chat_id = user.id, reason = %e, "Email rejected");
                return Ok(reply(replies::INVALID_EMAIL, Keyboard::Keep));
            }
        };
        let store = &self.inner.store;

        let card = NewCard {
            name: user.name.clone(),
            phone: user.phone.clone(),
            email: email.to_string(),
            external_ref: user.id,
        };

        match self.inner.registry.create_card(card).await {
            Ok(code) => {
                self.link_card(user.id, &code).await?;
                store.set_state(user.id, UserState::Authorized).await?;
                tracing::info!(chat_id = user.id, code = %code, "Registration complete");
                Ok(reply(replies::REGISTERED, Keyboard::MainMenu))
            }
            Err(e) => {
                tracing::error!(error = %e, chat_id = user.id, "Card creation failed, resetting registration");
                store.set_code(user.id, "").await?;
                store.upsert(user.id, "", "").await?;
                store.set_state(user.id, UserState::Unauthorized).await?;
                Ok(reply(replies::REGISTRATION_FAILED, Keyboard::Remove))
            }
        }
    }

    async fn submit_new_mail(&self, user: &UserRecord, input: &str) -> Result<Vec<Directive>, StoreError> {
        let store = &self.inner.store;
        store.set_state(user.id, UserState::Authorized).await?;

        let email = match self.check_email(input).await {
            Ok(email) => email,
            Err(_) => return Ok(reply(replies::MAIL_INVALID_BACK, Keyboard::MainMenu)),
        };

        match self
            .inner
            .registry
            .update_card_contact(&user.phone, email, user.id)
            .await
        {
            Ok(code) => {
                if user.card_code() != Some(code.as_str()) {
                    self.link_card(user.id, &code).await?;
                }
                tracing::info!(chat_id = user.id, "Card email updated");
                Ok(reply(replies::MAIL_UPDATED, Keyboard::MainMenu))
            }
            Err(e) => {
                tracing::warn!(error = %e, chat_id = user.id, "Card email update failed");
                Ok(reply(replies::MAIL_UPDATE_FAILED, Keyboard::MainMenu))
            }
        }
    }

    // ─── Menu ────────────────────────────────────────────────────

    async fn show_balance(&self, user: &UserRecord) -> Vec<Directive> {
        let Some(code) = user.card_code() else {
            return reply(replies::CARD_MISSING, Keyboard::MainMenu);
        };
        match self.inner.registry.get_balance(code).await {
            Ok(balance) => reply(replies::balance(&balance), Keyboard::MainMenu),
            Err(e) => {
                tracing::warn!(error = %e, chat_id = user.id, "Balance request failed");
                reply(replies::BALANCE_FAILED, Keyboard::MainMenu)
            }
        }
    }

    async fn show_qr(&self, user: &UserRecord) -> Vec<Directive> {
        let Some(code) = user.card_code() else {
            return reply(replies::CARD_MISSING, Keyboard::MainMenu);
        };
        match self.inner.registry.get_qr_image(code).await {
            Ok(image) => vec![Directive::ReplyPhoto {
                image,
                caption: Some(replies::QR_CAPTION.to_string()),
            }],
            Err(e) => {
                tracing::warn!(error = %e, chat_id = user.id, "QR request failed");
                reply(replies::QR_FAILED, Keyboard::MainMenu)
            }
        }
    }

    async fn show_history(&self, user: &UserRecord) -> Vec<Directive> {
        let Some(code) = user.card_code() else {
            return reply(replies::CARD_MISSING, Keyboard::MainMenu);
        };
        let limit = self.inner.settings.history_limit;
        match self.inner.registry.get_history(code, limit).await {
            Ok(entries) if entries.is_empty() => reply(replies::HISTORY_EMPTY, Keyboard::MainMenu),
            Ok(entries) => reply(replies::history(&entries), Keyboard::MainMenu),
            Err(e) => {
                tracing::warn!(error = %e, chat_id = user.id, "History request failed");
                reply(replies::HISTORY_FAILED, Keyboard::MainMenu)
            }
        }
    }

    /// Back to phone entry, keeping name, phone and card link.
    async fn logout(&self, user: &UserRecord) -> Result<Vec<Directive>, StoreError> {
        self.forget_session(user.id);
        self.inner
            .store
            .set_state(user.id, UserState::AwaitingPhone)
            .await?;
        tracing::info!(chat_id = user.id, "User logged out");
        Ok(reply(replies::LOGGED_OUT, Keyboard::RequestPhone))
    }
}

fn is_signed_in(state: UserState) -> bool {
    matches!(
        state,
        UserState::Authorized | UserState::AwaitingMailAddress
    )
}

/// A text that matches a button label shown in `state`.
fn button_for(state: UserState, text: &str) -> Option<CallbackKind> {
    let kind = CallbackKind::from_label(text)?;
    let shown = match state {
        UserState::AwaitingCode => {
            matches!(kind, CallbackKind::ChangePhone | CallbackKind::ResendCode)
        }
        UserState::Authorized => matches!(
            kind,
            CallbackKind::Balance
                | CallbackKind::QrCode
                | CallbackKind::History
                | CallbackKind::ChangeMail
                | CallbackKind::Logout
        ),
        UserState::AwaitingMailAddress => matches!(kind, CallbackKind::Back),
        _ => false,
    };
    shown.then_some(kind)
}

/// Re-prompt for whatever the current state is waiting for.
fn prompt_for(state: UserState) -> Vec<Directive> {
    match state {
        UserState::Unauthorized => reply(replies::START_OVER, Keyboard::Remove),
        UserState::AwaitingPhone => reply(replies::PHONE_PENDING, Keyboard::RequestPhone),
        UserState::AwaitingCode => reply(replies::ENTER_CODE, Keyboard::CodeControls),
        UserState::AwaitingName => reply(replies::ENTER_NAME, Keyboard::Keep),
        UserState::AwaitingMail => reply(replies::ENTER_MAIL, Keyboard::Keep),
        UserState::AwaitingMailAddress => reply(replies::ASK_NEW_MAIL, Keyboard::BackToMenu),
        UserState::Authorized => reply(replies::MENU, Keyboard::MainMenu),
    }
}
