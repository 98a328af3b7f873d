// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user conversation state: identity records, pending verification
//! codes and failed-attempt counters.
//!
//! All three stores live for the lifetime of the process.

pub mod attempts;
pub mod identity;
pub mod verification;

pub use attempts::AttemptLimiter;
pub use identity::{IdentityStore, InMemoryIdentityStore};
pub use verification::{CodeError, VerificationCodes};

/// Identity store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store found itself inconsistent; the operation was not applied.
    #[error("Store invariant violated: {0}")]
    InvariantViolation(String),
}
