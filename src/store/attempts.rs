// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Failed verification attempt counter.

use crate::models::ChatId;
use dashmap::DashMap;

/// Failures allowed before the session is reset to phone entry.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Default)]
pub struct AttemptLimiter {
    failures: DashMap<ChatId, u32>,
}

impl AttemptLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a failure and return how many attempts remain (0 = exhausted).
    pub fn record_failure(&self, id: ChatId) -> u32 {
        let mut count = self.failures.entry(id).or_insert(0);
        *count += 1;
        MAX_ATTEMPTS.saturating_sub(*count)
    }

    pub fn reset(&self, id: ChatId) {
        self.failures.remove(&id);
    }

    pub fn failures(&self, id: ChatId) -> u32 {
        self.failures.get(&id).map(|c| *c).unwrap_or(0)
    }
}
