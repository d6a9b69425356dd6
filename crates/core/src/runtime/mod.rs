//! Process lifecycle: the power poll loop, status broadcast and shutdown.

pub mod bootstrap;
mod runner;
mod shutdown;

pub use bootstrap::Backends;
pub use runner::Runtime;
pub use shutdown::ShutdownGuard;
pub use crate::types::RuntimeStatus;
