use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// A single text message addressed to one phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingSms {
    pub to: String,
    pub body: String,
}

impl OutgoingSms {
    pub fn new(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self { to: to.into(), body: body.into() }
    }
}

/// What the provider returned for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsReceipt {
    /// Provider-side message id, when the provider reports one.
    pub provider_id: Option<String>,
}

/// Error type for SMS operations.
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// The facility itself cannot send (no credentials, unreachable, revoked).
    /// Callers abort the whole batch on this variant.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// The provider refused this particular recipient or message.
    #[error("rejected for {to}: {reason}")]
    Rejected { to: String, reason: String },
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
}

impl SmsError {
    /// True if the error concerns the facility rather than one recipient.
    pub fn is_wholesale(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type SmsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SmsError>> + Send + 'a>>;

/// Trait for SMS providers (Twilio, webhook relays, test doubles).
pub trait SmsGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt a single delivery. No retries happen at this layer.
    fn send(&self, sms: OutgoingSms) -> SmsFuture<'_, SmsReceipt>;

    /// Check that the gateway is authorized to send.
    fn probe(&self) -> SmsFuture<'_, ()>;
}

/// A message recorded by [`MockGateway`].
#[derive(Debug, Clone)]
pub struct SentSms {
    pub sms: OutgoingSms,
    pub at: tokio::time::Instant,
}

/// Mock gateway for tests and dry runs: records every send.
#[derive(Debug, Default)]
pub struct MockGateway {
    name: String,
    sent: Mutex<Vec<SentSms>>,
    failing: Mutex<HashSet<String>>,
    unavailable: Mutex<Option<String>>,
    unreachable: Mutex<HashMap<String, String>>,
    deny_probe: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self { name: "mock".into(), ..Self::default() }
    }

    /// Gateway used when no provider is configured. Sends are only logged.
    pub fn dry_run() -> Self {
        Self { name: "dry-run".into(), ..Self::default() }
    }

    /// Make sends to `to` fail with [`SmsError::Rejected`].
    pub fn fail_for(self, to: impl Into<String>) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(to.into());
        self
    }

    /// Make every send fail with [`SmsError::Unavailable`].
    pub fn unavailable(self, reason: impl Into<String>) -> Self {
        *self.unavailable.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
        self
    }

    /// Make sends to `to` fail with [`SmsError::Unavailable`], as a dropped
    /// connection would.
    pub fn unavailable_for(self, to: impl Into<String>, reason: impl Into<String>) -> Self {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(to.into(), reason.into());
        self
    }

    /// Make [`SmsGateway::probe`] report missing authorization.
    pub fn deny_probe(mut self) -> Self {
        self.deny_probe = true;
        self
    }

    /// Messages delivered so far, in send order.
    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl SmsGateway for MockGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, sms: OutgoingSms) -> SmsFuture<'_, SmsReceipt> {
        Box::pin(async move {
            if let Some(reason) = self
                .unavailable
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
            {
                return Err(SmsError::Unavailable(reason));
            }
            if let Some(reason) = self
                .unreachable
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&sms.to)
                .cloned()
            {
                return Err(SmsError::Unavailable(reason));
            }
            let rejected = self
                .failing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&sms.to);
            if rejected {
                return Err(SmsError::Rejected {
                    to: sms.to,
                    reason: "scripted failure".into(),
                });
            }
            tracing::info!(gateway = %self.name, to = %sms.to, body = %sms.body, "sms sent");
            let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
            sent.push(SentSms { sms, at: tokio::time::Instant::now() });
            Ok(SmsReceipt { provider_id: Some(format!("{}-{}", self.name, sent.len())) })
        })
    }

    fn probe(&self) -> SmsFuture<'_, ()> {
        let denied = self.deny_probe;
        Box::pin(async move {
            if denied {
                Err(SmsError::Unavailable("not authorized".into()))
            } else {
                Ok(())
            }
        })
    }
}
