//! Debouncing notification timer

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

/// Work run when a scheduled notification fires
#[async_trait]
pub trait NotificationCallback: Send + Sync {
    async fn notify(&self);
}

#[derive(Default)]
struct TimerState {
    /// Latest point the pending notification may fire at
    due: Option<Instant>,
    /// Pending timer task, cleared once it fires
    handle: Option<JoinHandle<()>>,
    /// Bumped on every arm and cancel so stale timers stand down
    generation: u64,
}

impl TimerState {
    fn pending(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Coalesces [`NotificationTimer::schedule`] calls into bounded-rate callbacks
///
/// A call arms the timer for `min_interval`. Further calls while it is pending
/// push the firing back by up to `min_interval` again, but never past
/// `max_interval` after the call that first armed it. With either bound at
/// zero every call runs the callback directly.
pub struct NotificationTimer {
    min_interval: Duration,
    max_interval: Duration,
    callback: Arc<dyn NotificationCallback>,
    state: Arc<Mutex<TimerState>>,
}

impl NotificationTimer {
    pub fn new(
        min_interval: Duration,
        max_interval: Duration,
        callback: Arc<dyn NotificationCallback>,
    ) -> Self {
        Self {
            min_interval,
            max_interval,
            callback,
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.min_interval.is_zero() || self.max_interval.is_zero()
    }

    /// A notification is armed and has not fired yet
    pub fn is_pending(&self) -> bool {
        self.state.lock().map_or(false, |state| state.pending())
    }

    /// Request a notification
    pub async fn schedule(&self) {
        if self.is_immediate() {
            self.callback.notify().await;
            return;
        }

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                error!("Notification timer lock poisoned, dropping schedule request");
                return;
            }
        };

        let now = Instant::now();
        let delay = match state.due {
            Some(due) if state.pending() && due >= now => {
                let remaining = due.saturating_duration_since(now);
                self.min_interval.min(remaining)
            }
            _ => {
                state.due = Some(now + self.max_interval);
                self.min_interval
            }
        };

        state.disarm();
        let generation = state.generation;

        debug!("Notification scheduled in {:?}", delay);

        let shared = Arc::clone(&self.state);
        let callback = Arc::clone(&self.callback);
        state.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let Ok(mut state) = shared.lock() else {
                    return;
                };
                if state.generation != generation {
                    return;
                }
                state.handle = None;
            }

            callback.notify().await;
        }));
    }

    /// Drop any pending notification
    pub fn cancel(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.pending() {
                debug!("Pending notification cancelled");
            }
            state.disarm();
        }
    }
}

impl Drop for NotificationTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
