// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-shot deferred reminders, at most one per chat user.
//!
//! Scheduling a reminder replaces (aborts) the previous one for the same
//! user. The reminder action is expected to re-check the user's state
//! before doing anything, since a cancel can race with the timer firing.

use crate::models::{ChatId, UserState};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Scheduled {
    expected: UserState,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct ReminderScheduler {
    tasks: DashMap<ChatId, Scheduled>,
    next_generation: AtomicU64,
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the future built by `action` after `delay` unless cancelled or
    /// replaced first. `action` receives the reminder's generation, which
    /// the future must pass to [`claim`](Self::claim) before acting.
    pub fn schedule<F, Fut>(&self, id: ChatId, expected: UserState, delay: Duration, action: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fire = action(generation);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        });

        let scheduled = Scheduled {
            expected,
            generation,
            handle,
        };
        if let Some(previous) = self.tasks.insert(id, scheduled) {
            previous.handle.abort();
        }
        tracing::debug!(chat_id = id, expected = %expected, delay_secs = delay.as_secs(), "Reminder scheduled");
    }

    /// Take ownership of a due reminder. Returns the expected state only if
    /// `generation` is still the current reminder for `id`; a cancelled or
    /// replaced reminder gets `None` and must not act.
    pub fn claim(&self, id: ChatId, generation: u64) -> Option<UserState> {
        self.tasks
            .remove_if(&id, |_, s| s.generation == generation)
            .map(|(_, s)| s.expected)
    }

    /// Abort the pending reminder for `id`. Returns whether one was pending.
    pub fn cancel(&self, id: ChatId) -> bool {
        match self.tasks.remove(&id) {
            Some((_, scheduled)) => {
                scheduled.handle.abort();
                true
            }
            None => false,
        }
    }

    /// State the pending reminder for `id` expects, if one is pending.
    pub fn pending(&self, id: ChatId) -> Option<UserState> {
        self.tasks
            .get(&id)
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let make = move || {
            let f = f.clone();
            Box::pin(async move {
                f.fetch_add(1, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let scheduler = ReminderScheduler::new();
        let (fired, make) = counter();

        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), |_| make());
        assert_eq!(scheduler.pending(1), Some(UserState::AwaitingCode));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let scheduler = ReminderScheduler::new();
        let (fired, make) = counter();

        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), |_| make());
        assert!(scheduler.cancel(1));
        assert!(!scheduler.cancel(1));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_previous() {
        let scheduler = ReminderScheduler::new();
        let (fired, make) = counter();

        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), |_| make());
        tokio::time::sleep(Duration::from_secs(30)).await;
        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), |_| make());

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_only_succeeds_for_current_generation() {
        let scheduler = ReminderScheduler::new();
        let first = Arc::new(AtomicU64::new(u64::MAX));
        let second = Arc::new(AtomicU64::new(u64::MAX));

        let g = first.clone();
        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), move |n| {
            g.store(n, Ordering::SeqCst);
            async {}
        });
        let g = second.clone();
        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), move |n| {
            g.store(n, Ordering::SeqCst);
            async {}
        });

        let first = first.load(Ordering::SeqCst);
        let second = second.load(Ordering::SeqCst);
        assert_ne!(first, second);

        // A replaced reminder that already woke up must not act
        assert_eq!(scheduler.claim(1, first), None);
        assert_eq!(scheduler.claim(1, second), Some(UserState::AwaitingCode));
        assert_eq!(scheduler.claim(1, second), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_after_cancel_fails() {
        let scheduler = ReminderScheduler::new();
        let generation = Arc::new(AtomicU64::new(u64::MAX));

        let g = generation.clone();
        scheduler.schedule(1, UserState::AwaitingCode, Duration::from_secs(60), move |n| {
            g.store(n, Ordering::SeqCst);
            async {}
        });
        scheduler.cancel(1);

        assert_eq!(scheduler.claim(1, generation.load(Ordering::SeqCst)), None);
    }
}
