use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use plugwatch_sms::SmsGateway;

use crate::io::notice::NoticeSender;

/// Gate checked before every dispatch attempt.
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self) -> bool;

    /// Ask for the capability again. Resolves in the background; never blocks
    /// and gives no guarantee the next `is_granted` sees the result.
    fn request(&self);
}

/// Fixed answer, with a request counter. Used in tests and dry runs.
#[derive(Debug)]
pub struct StaticPermission {
    granted: AtomicBool,
    requests: AtomicUsize,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self { granted: AtomicBool::new(true), requests: AtomicUsize::new(0) }
    }

    pub fn denied() -> Self {
        Self { granted: AtomicBool::new(false), requests: AtomicUsize::new(0) }
    }

    pub fn set(&self, granted: bool) {
        self.granted.store(granted, Ordering::Relaxed);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl PermissionGate for StaticPermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::Relaxed)
    }

    fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

/// Permission backed by the gateway's own authorization probe.
///
/// Starts denied; a successful [`SmsGateway::probe`] flips it to granted.
pub struct GatewayPermission {
    gateway: Arc<dyn SmsGateway>,
    granted: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    notices: NoticeSender,
}

impl GatewayPermission {
    pub fn new(gateway: Arc<dyn SmsGateway>, notices: NoticeSender) -> Self {
        Self {
            gateway,
            granted: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicBool::new(false)),
            notices,
        }
    }
}

async fn probe_and_record(
    gateway: &dyn SmsGateway,
    granted: &AtomicBool,
    notices: &NoticeSender,
) -> bool {
    match gateway.probe().await {
        Ok(()) => {
            granted.store(true, Ordering::Relaxed);
            tracing::info!(gateway = gateway.name(), "sms permission granted");
            notices.info("Permiso concedido para enviar SMS");
            true
        }
        Err(e) => {
            granted.store(false, Ordering::Relaxed);
            tracing::warn!(gateway = gateway.name(), error = %e, "sms permission denied");
            notices.warn("Permiso denegado para enviar SMS");
            false
        }
    }
}

impl PermissionGate for GatewayPermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::Relaxed)
    }

    fn request(&self) {
        // One probe at a time.
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("permission request outside a tokio runtime, ignored");
            self.in_flight.store(false, Ordering::Release);
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        let granted = Arc::clone(&self.granted);
        let in_flight = Arc::clone(&self.in_flight);
        let notices = self.notices.clone();
        handle.spawn(async move {
            probe_and_record(&*gateway, &granted, &notices).await;
            in_flight.store(false, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::notice;
    use plugwatch_sms::MockGateway;

    #[test]
    fn static_permission_counts_requests() {
        let p = StaticPermission::denied();
        assert!(!p.is_granted());
        p.request();
        p.request();
        assert_eq!(p.requests(), 2);
        p.set(true);
        assert!(p.is_granted());
    }

    #[tokio::test]
    async fn request_grants_on_successful_probe() {
        let (tx, mut rx) = notice::channel();
        let perm = GatewayPermission::new(Arc::new(MockGateway::new()), tx);
        assert!(!perm.is_granted());
        perm.request();
        assert_eq!(rx.recv().await.unwrap().content, "Permiso concedido para enviar SMS");
        assert!(perm.is_granted());
    }

    #[tokio::test]
    async fn request_resolves_in_background() {
        let (tx, mut rx) = notice::channel();
        let perm = GatewayPermission::new(Arc::new(MockGateway::new().deny_probe()), tx);
        perm.request();
        let n = rx.recv().await.unwrap();
        assert_eq!(n.content, "Permiso denegado para enviar SMS");
        assert!(!perm.is_granted());
    }
}
