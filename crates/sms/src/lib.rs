//! Outbound SMS facility for plugwatch.
//!
//! [`gateway::SmsGateway`] is the seam the notifier dispatches through;
//! [`http::HttpGateway`] talks to a real provider, [`gateway::MockGateway`]
//! records sends for tests and dry runs.

pub mod gateway;
pub mod http;

pub use gateway::{MockGateway, OutgoingSms, SentSms, SmsError, SmsGateway, SmsReceipt};
