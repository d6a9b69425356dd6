use std::io;
use std::sync::{Mutex, PoisonError};

use crate::power::plug::PlugType;

/// Anything that can report the current plug type on demand.
pub trait PowerSource: Send + Sync {
    fn name(&self) -> &str;

    fn sample(&self) -> io::Result<PlugType>;
}

/// Power source with a settable value. Used in tests and replay tools.
#[derive(Debug)]
pub struct StaticPowerSource {
    current: Mutex<PlugType>,
}

impl StaticPowerSource {
    pub fn new(initial: PlugType) -> Self {
        Self { current: Mutex::new(initial) }
    }

    pub fn set(&self, plug: PlugType) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = plug;
    }
}

impl PowerSource for StaticPowerSource {
    fn name(&self) -> &str {
        "static"
    }

    fn sample(&self) -> io::Result<PlugType> {
        Ok(*self.current.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
