use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::dispatch::Dispatcher;
use super::timer::TimerSet;
use crate::io::notice::NoticeSender;
use crate::permission::PermissionGate;
use crate::state::AppState;
use crate::types::{NotificationId, NotificationKind, ScheduledNotification, format_timestamp};

/// Report returned by [`NotificationScheduler::describe_pending`] when nothing is queued.
pub const NO_PENDING: &str = "No hay SMS programados";

/// Queue of notifications waiting for their delay.
///
/// Every read and write of the queue goes through one mutex. The timer
/// callback runs on a tokio task, concurrently with `schedule`,
/// `describe_pending` and `cancel_all`; the mutex is what keeps them apart.
pub struct NotificationScheduler {
    delay: Duration,
    queue: Mutex<Vec<ScheduledNotification>>,
    timers: TimerSet,
    state: Arc<AppState>,
    dispatcher: Dispatcher,
    permission: Arc<dyn PermissionGate>,
    notices: NoticeSender,
}

impl NotificationScheduler {
    pub fn new(
        delay: Duration,
        state: Arc<AppState>,
        dispatcher: Dispatcher,
        permission: Arc<dyn PermissionGate>,
        notices: NoticeSender,
    ) -> Arc<Self> {
        Arc::new(Self {
            delay,
            queue: Mutex::new(Vec::new()),
            timers: TimerSet::new(),
            state,
            dispatcher,
            permission,
            notices,
        })
    }

    /// Queue a notification for `kind` and arm its timer.
    ///
    /// The displayed send time is `event_at + delay`, but the timer counts
    /// from now, so a past `event_at` makes the two diverge.
    pub fn schedule(self: &Arc<Self>, kind: NotificationKind, event_at: DateTime<Utc>) -> NotificationId {
        let message = self.state.templates().render(kind, event_at);
        let send_at = event_at
            .checked_add_signed(delay_delta(self.delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let id = NotificationId::new();
        let entry = ScheduledNotification { id, kind, message, event_at, send_at };

        {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.push(entry);
            // Armed under the lock so cancel_all cannot slip in between.
            let weak = Arc::downgrade(self);
            self.timers.after(self.delay, async move {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.dispatch(id);
                }
            });
        }

        let send_at_text = format_timestamp(send_at);
        tracing::info!(%id, kind = ?kind, send_at = %send_at_text, "sms scheduled");
        self.notices
            .info(format!("SMS de {} programado para: {send_at_text}", kind.noun()));
        id
    }

    /// Fire a queued notification. Returns `false` if `id` is no longer queued.
    ///
    /// The entry is removed whatever happens to the send itself.
    pub fn dispatch(&self, id: NotificationId) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(pos) = queue.iter().position(|n| n.id == id) else {
            tracing::debug!(%id, "notification no longer queued");
            return false;
        };
        let entry = queue.remove(pos);

        if self.permission.is_granted() {
            let contacts = self.state.contacts();
            if self.dispatcher.send_to_all(entry.message, contacts).is_some() {
                tracing::info!(%id, kind = ?entry.kind, "sms dispatch started");
                self.notices.info(format!("SMS de {} enviado", entry.kind.noun()));
            }
        } else {
            tracing::warn!(%id, kind = ?entry.kind, "send permission missing, notification dropped");
            self.permission.request();
        }
        true
    }

    /// Human-readable queue listing in insertion order.
    pub fn describe_pending(&self) -> String {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.is_empty() {
            return NO_PENDING.to_owned();
        }
        let mut out = format!("SMS programados ({}):\n", queue.len());
        for (i, n) in queue.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} - Evento: {} - Envío: {}",
                i + 1,
                n.kind.label(),
                format_timestamp(n.event_at),
                format_timestamp(n.send_at)
            );
        }
        out
    }

    /// Drop every queued notification and cancel their timers.
    pub fn cancel_all(&self) -> usize {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = queue.len();
        queue.clear();
        self.timers.cancel_all();
        if dropped > 0 {
            tracing::info!(dropped, "pending notifications cancelled");
        }
        dropped
    }

    pub fn pending(&self) -> Vec<ScheduledNotification> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn delay_delta(delay: Duration) -> TimeDelta {
    TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX)
}
