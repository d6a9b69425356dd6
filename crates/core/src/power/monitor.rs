use chrono::{DateTime, Utc};

use crate::power::plug::PlugType;
use crate::types::NotificationKind;

/// A detected power edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTransition {
    pub kind: NotificationKind,
    pub at: DateTime<Utc>,
}

/// Result of feeding one sample to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Same state as the previous sample.
    Unchanged,
    /// The state flipped and there is somebody to notify.
    Transition(PowerTransition),
    /// The state flipped but the contact list is empty. The flag was still updated.
    Suppressed(NotificationKind),
}

/// Edge detector over plugged/unplugged samples.
#[derive(Debug, Default)]
pub struct PowerMonitor {
    /// Last known "currently plugged" flag.
    plugged: bool,
    /// Number of samples observed.
    samples: u64,
}

impl PowerMonitor {
    /// Monitor that assumes the device starts unplugged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitor that starts from a known state, e.g. the first sample at startup.
    pub fn primed(plugged: bool) -> Self {
        Self { plugged, samples: 0 }
    }

    /// Feed a raw plug-type code.
    pub fn observe_code(&mut self, code: i32, at: DateTime<Utc>, has_contacts: bool) -> Observation {
        self.observe(PlugType::from_code(code).is_plugged(), at, has_contacts)
    }

    /// Feed a plugged flag; returns whether an edge was crossed.
    pub fn observe(&mut self, plugged: bool, at: DateTime<Utc>, has_contacts: bool) -> Observation {
        self.samples += 1;
        if plugged == self.plugged {
            return Observation::Unchanged;
        }
        self.plugged = plugged;
        let kind = NotificationKind::from_plugged(plugged);
        if has_contacts {
            Observation::Transition(PowerTransition { kind, at })
        } else {
            Observation::Suppressed(kind)
        }
    }

    pub fn is_plugged(&self) -> bool {
        self.plugged
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}
