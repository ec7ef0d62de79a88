//! Cancelable one-shot timers owned by a guild's controller.
//!
//! Each armed timer gets a fresh id. A timer that fires posts a [`TimerFired`] into the
//! controller's mailbox, and the controller only acts on it if [`Timers::take_if_current`]
//! confirms that exact timer is still armed. A timer canceled after its message was already
//! queued is therefore ignored.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Queue drained; tear down when it expires
    IdleDisconnect,
    /// Backoff before re-attempting the head after a failure
    RetryBackoff,
    /// Transport dropped; tear down unless a reconnect arrives first
    DisconnectGrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub id: u64,
}

/// A spawned sleep that is canceled when this handle is dropped.
#[derive(Debug)]
struct ScheduledTimer {
    id: u64,
    token: CancellationToken,
}

impl ScheduledTimer {
    fn spawn<F>(id: u64, delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire(),
            }
        });

        Self { id, token }
    }
}

impl Drop for ScheduledTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The three timer slots of one guild queue.
#[derive(Debug, Default)]
pub struct Timers {
    next_id: u64,
    idle: Option<ScheduledTimer>,
    retry: Option<ScheduledTimer>,
    grace: Option<ScheduledTimer>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<ScheduledTimer> {
        match kind {
            TimerKind::IdleDisconnect => &mut self.idle,
            TimerKind::RetryBackoff => &mut self.retry,
            TimerKind::DisconnectGrace => &mut self.grace,
        }
    }

    /// Arms `kind`, replacing (and canceling) any timer of the same kind.
    pub fn arm<F>(&mut self, kind: TimerKind, delay: Duration, notify: F)
    where
        F: FnOnce(TimerFired) + Send + 'static,
    {
        self.next_id += 1;
        let fired = TimerFired {
            kind,
            id: self.next_id,
        };
        debug!("⏲️ Arming {:?} timer #{} for {:?}", kind, fired.id, delay);
        *self.slot(kind) = Some(ScheduledTimer::spawn(fired.id, delay, move || notify(fired)));
    }

    /// Returns whether a timer of `kind` was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let canceled = self.slot(kind).take().is_some();
        if canceled {
            debug!("⏲️ Canceled {:?} timer", kind);
        }
        canceled
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::IdleDisconnect => self.idle.is_some(),
            TimerKind::RetryBackoff => self.retry.is_some(),
            TimerKind::DisconnectGrace => self.grace.is_some(),
        }
    }

    /// Disarms and returns true only if `fired` is the timer currently armed for its kind.
    pub fn take_if_current(&mut self, fired: TimerFired) -> bool {
        let slot = self.slot(fired.kind);
        match slot {
            Some(timer) if timer.id == fired.id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.idle = None;
        self.retry = None;
        self.grace = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::default();
        timers.arm(TimerKind::IdleDisconnect, Duration::from_secs(300), move |f| {
            let _ = tx.send(f);
        });

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.kind, TimerKind::IdleDisconnect);
        assert!(timers.take_if_current(fired));
        assert!(!timers.is_armed(TimerKind::IdleDisconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerFired>();
        let mut timers = Timers::default();
        timers.arm(TimerKind::DisconnectGrace, Duration::from_secs(5), move |f| {
            let _ = tx.send(f);
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timers.cancel(TimerKind::DisconnectGrace));

        tokio::time::sleep(Duration::from_secs(10)).await;
        // sender dropped with the canceled task, nothing was sent
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fire_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::default();
        let first_tx = tx.clone();
        timers.arm(TimerKind::RetryBackoff, Duration::from_secs(3), move |f| {
            let _ = first_tx.send(f);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        let stale = rx.recv().await.unwrap();

        // re-armed before the stale message was handled
        timers.arm(TimerKind::RetryBackoff, Duration::from_secs(3), move |f| {
            let _ = tx.send(f);
        });
        assert!(!timers.take_if_current(stale));
        assert!(timers.is_armed(TimerKind::RetryBackoff));

        let fresh = rx.recv().await.unwrap();
        assert!(timers.take_if_current(fresh));
    }
}
