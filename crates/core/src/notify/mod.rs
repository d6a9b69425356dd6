//! Delayed SMS notifications: the pending queue, its timers, and the batch sender.

pub mod dispatch;
pub mod scheduler;
pub mod timer;

pub use dispatch::{DispatchReport, Dispatcher};
pub use scheduler::{NO_PENDING, NotificationScheduler};
pub use timer::TimerSet;
