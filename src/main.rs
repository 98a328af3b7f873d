// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Loyalty-Bot API Server
//!
//! Receives chat events from the transport adapter and answers with the
//! replies the conversation state machine produces.

use loyalty_bot::{
    config::Config,
    services::{
        Collaborators, ConversationController, DnsOverHttpsChecker, InMemoryCardRegistry,
        LoggingChatSender, LoggingMessenger,
    },
    store::InMemoryIdentityStore,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Loyalty-Bot API");

    let store = Arc::new(InMemoryIdentityStore::new());

    // No registry client is wired in; cards live in memory for this process
    let registry = Arc::new(InMemoryCardRegistry::new());
    tracing::warn!("Using in-memory card registry; cards are lost on restart");

    let mail_domains = Arc::new(DnsOverHttpsChecker::new(&config.dns_resolver_url));
    tracing::info!(resolver = %config.dns_resolver_url, "MX checks via DNS-over-HTTPS");

    let controller = ConversationController::new(
        Collaborators {
            store,
            registry,
            messenger: Arc::new(LoggingMessenger),
            mail_domains,
            chat: Arc::new(LoggingChatSender),
        },
        config.conversation_settings(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        controller,
    });

    // Build router
    let app = loyalty_bot::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("loyalty_bot=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
