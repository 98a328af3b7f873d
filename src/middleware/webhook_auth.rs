// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for the chat adapter webhook.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the shared secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Require `x-webhook-secret` to match the configured secret.
pub async fn require_webhook_secret(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .map(|h| h.as_bytes())
        .unwrap_or_default();

    if !secrets_match(provided, state.config.webhook_secret.as_bytes()) {
        tracing::warn!(
            path = %request.uri().path(),
            header_present = !provided.is_empty(),
            "Blocked webhook request with invalid secret"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Constant-time comparison; an empty expected secret never matches.
fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    !expected.is_empty() && bool::from(provided.ct_eq(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match(b"abc", b"abc"));
        assert!(!secrets_match(b"abd", b"abc"));
        assert!(!secrets_match(b"ab", b"abc"));
        assert!(!secrets_match(b"", b""));
    }
}
