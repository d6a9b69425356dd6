//! Power-state sensing: plug codes, edge detection, and the sources that feed them.

pub mod monitor;
pub mod plug;
pub mod source;
pub mod sysfs;

use chrono::{DateTime, Utc};

pub use monitor::{Observation, PowerMonitor, PowerTransition};
pub use plug::PlugType;
pub use source::{PowerSource, StaticPowerSource};
pub use sysfs::SysfsPowerSource;

/// Receiver of raw power-state reports.
///
/// Reports arrive on every sample, not only on changes; implementors do their
/// own edge detection (see [`PowerMonitor`]).
pub trait PowerStateListener: Send + Sync {
    fn on_power_state_changed(&self, is_plugged: bool, at: DateTime<Utc>);
}
