// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod card;
pub mod event;
pub mod user;

pub use card::{Balance, CardHolder, HistoryEntry, NewCard, PendingDeduction, QrImage};
pub use event::{CallbackKind, Directive, InboundEvent, Keyboard};
pub use user::{ChatId, UserPatch, UserRecord, UserState};
