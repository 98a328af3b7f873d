// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Loyalty-Bot: sign-in and registration for a loyalty card chat bot
//!
//! This crate drives the per-user conversation that verifies a phone
//! number by SMS code, links it to an existing loyalty card or registers
//! a new one, and then serves balance, QR code and history requests.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use config::Config;
use services::ConversationController;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub controller: ConversationController,
}
