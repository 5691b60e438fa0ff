//! Cancellable one-shot timers that report back as events.

use std::collections::HashMap;

use stockroom_core::{IntentId, NoticeId};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::view::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Grace(IntentId),
    Notice(NoticeId),
}

impl TimerKey {
    /// Timer whose expiry this event reports, if any.
    pub fn of(event: &Event) -> Option<Self> {
        match event {
            Event::GraceExpired { intent } => Some(TimerKey::Grace(*intent)),
            Event::NoticeExpired { notice } => Some(TimerKey::Notice(*notice)),
            _ => None,
        }
    }
}

/// Armed timers keyed by what they guard.
///
/// At most one timer per key; re-arming a key cancels the previous timer.
#[derive(Debug, Default)]
pub struct Timers {
    armed: HashMap<TimerKey, CancellationToken>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task that sends `event` on `tx` at `deadline` unless cancelled first.
    pub fn arm(&mut self, key: TimerKey, deadline: Instant, event: Event, tx: UnboundedSender<Event>) {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = tx.send(event);
                }
            }
        });

        if let Some(previous) = self.armed.insert(key, token) {
            previous.cancel();
        }
    }

    /// Cancel the timer for `key`. Unknown, fired or already cancelled keys are a no-op.
    pub fn cancel(&mut self, key: TimerKey) {
        if let Some(token) = self.armed.remove(&key) {
            token.cancel();
        }
    }

    /// Forget a timer whose event has been received.
    pub fn fired(&mut self, key: TimerKey) {
        self.armed.remove(&key);
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.armed.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    pub fn cancel_all(&mut self) {
        for (_, token) in self.armed.drain() {
            token.cancel();
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_at_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new();
        let intent = IntentId::new();

        timers.arm(
            TimerKey::Grace(intent),
            Instant::now() + Duration::from_millis(5000),
            Event::GraceExpired { intent },
            tx,
        );

        let start = Instant::now();
        let event = rx.recv().await.unwrap();
        assert_eq!(event, Event::GraceExpired { intent });
        assert!(start.elapsed() >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_suppresses_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new();
        let intent = IntentId::new();
        let key = TimerKey::Grace(intent);

        timers.arm(
            key,
            Instant::now() + Duration::from_millis(100),
            Event::GraceExpired { intent },
            tx,
        );
        timers.cancel(key);
        timers.cancel(key);
        assert!(!timers.is_armed(key));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }
}
