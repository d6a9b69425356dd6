use std::sync::Arc;
use std::time::Duration;

use plugwatch_sms::{OutgoingSms, SmsGateway};
use tokio::task::JoinHandle;

use crate::io::notice::NoticeSender;
use crate::types::Contact;

pub const NO_CONTACTS: &str = "No hay contactos para enviar SMS";

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// The gateway was unavailable on the first attempt and the batch was skipped.
    pub aborted: bool,
}

/// Sends one message to every contact, in order, pausing between attempts.
#[derive(Clone)]
pub struct Dispatcher {
    gateway: Arc<dyn SmsGateway>,
    pacing: Duration,
    notices: NoticeSender,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn SmsGateway>, pacing: Duration, notices: NoticeSender) -> Self {
        Self { gateway, pacing, notices }
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    /// Start a batch on its own task. Returns `None` (and a notice) if there
    /// is nobody to send to. A started batch always runs to completion.
    pub fn send_to_all(
        &self,
        message: String,
        contacts: Vec<Contact>,
    ) -> Option<JoinHandle<DispatchReport>> {
        if contacts.is_empty() {
            self.notices.warn(NO_CONTACTS);
            return None;
        }
        let gateway = Arc::clone(&self.gateway);
        let notices = self.notices.clone();
        let pacing = self.pacing;
        Some(tokio::spawn(async move {
            let report = run_batch(&*gateway, pacing, &notices, &message, &contacts).await;
            tracing::info!(
                gateway = gateway.name(),
                sent = report.sent,
                failed = report.failed,
                aborted = report.aborted,
                "dispatch batch finished"
            );
            report
        }))
    }
}

/// Sequential best-effort send. A per-recipient failure is reported and the
/// loop moves on. Only an unavailable gateway on the first attempt ends the
/// batch, with one generic notice; later outages count against that recipient.
pub async fn run_batch(
    gateway: &dyn SmsGateway,
    pacing: Duration,
    notices: &NoticeSender,
    message: &str,
    contacts: &[Contact],
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for (i, contact) in contacts.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pacing).await;
        }
        match gateway.send(OutgoingSms::new(&contact.address, message)).await {
            Ok(receipt) => {
                report.sent += 1;
                tracing::debug!(
                    to = %contact.address,
                    provider_id = receipt.provider_id.as_deref().unwrap_or("-"),
                    "sms accepted"
                );
            }
            Err(e) if i == 0 && e.is_wholesale() => {
                tracing::error!(error = %e, "sms gateway unavailable, aborting batch");
                notices.error(format!("Error general al enviar SMS: {e}"));
                report.aborted = true;
                break;
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(name = %contact.name, to = %contact.address, error = %e, "sms send failed");
                notices.error(format!(
                    "Error al enviar SMS a {} ({}): {e}",
                    contact.name, contact.address
                ));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::notice;
    use plugwatch_sms::MockGateway;

    fn contacts() -> Vec<Contact> {
        vec![
            Contact { name: "Alice".into(), address: "+111".into() },
            Contact { name: "Bob".into(), address: "+222".into() },
            Contact { name: "Carol".into(), address: "+333".into() },
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn sends_in_order_with_pacing() {
        let mock = Arc::new(MockGateway::new());
        let (tx, _rx) = notice::channel();
        let d = Dispatcher::new(mock.clone(), Duration::from_millis(500), tx);

        let report = d.send_to_all("hola".into(), contacts()).unwrap().await.unwrap();
        assert_eq!(report, DispatchReport { sent: 3, failed: 0, aborted: false });

        let sent = mock.sent();
        let to: Vec<_> = sent.iter().map(|s| s.sms.to.as_str()).collect();
        assert_eq!(to, ["+111", "+222", "+333"]);
        for pair in sent.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn empty_contacts_is_a_notice_not_a_batch() {
        let mock = Arc::new(MockGateway::new());
        let (tx, mut rx) = notice::channel();
        let d = Dispatcher::new(mock.clone(), Duration::ZERO, tx);

        assert!(d.send_to_all("hola".into(), Vec::new()).is_none());
        assert_eq!(rx.recv().await.unwrap().content, NO_CONTACTS);
        assert_eq!(mock.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn per_contact_failure_does_not_abort() {
        let mock = Arc::new(MockGateway::new().fail_for("+222"));
        let (tx, mut rx) = notice::channel();
        let d = Dispatcher::new(mock.clone(), Duration::from_millis(500), tx);

        let report = d.send_to_all("hola".into(), contacts()).unwrap().await.unwrap();
        assert_eq!(report, DispatchReport { sent: 2, failed: 1, aborted: false });

        let n = rx.recv().await.unwrap();
        assert!(n.content.starts_with("Error al enviar SMS a Bob (+222)"));
        // Pacing still applies around the failed attempt.
        let sent = mock.sent();
        assert!(sent[1].at - sent[0].at >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn outage_mid_batch_only_costs_that_recipient() {
        let mock = Arc::new(MockGateway::new().unavailable_for("+222", "connection reset"));
        let (tx, mut rx) = notice::channel();
        let d = Dispatcher::new(mock.clone(), Duration::from_millis(500), tx);

        let report = d.send_to_all("hola".into(), contacts()).unwrap().await.unwrap();
        assert_eq!(report, DispatchReport { sent: 2, failed: 1, aborted: false });

        let to: Vec<_> = mock.sent().iter().map(|s| s.sms.to.clone()).collect();
        assert_eq!(to, ["+111", "+333"]);
        let n = rx.recv().await.unwrap();
        assert!(n.content.starts_with("Error al enviar SMS a Bob (+222)"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn wholesale_failure_reports_once() {
        let mock = Arc::new(MockGateway::new().unavailable("sin servicio"));
        let (tx, mut rx) = notice::channel();
        let d = Dispatcher::new(mock.clone(), Duration::ZERO, tx);

        let report = d.send_to_all("hola".into(), contacts()).unwrap().await.unwrap();
        assert!(report.aborted);
        assert_eq!(report.sent + report.failed, 0);

        let n = rx.recv().await.unwrap();
        assert!(n.content.starts_with("Error general al enviar SMS"));
        assert!(rx.try_recv().is_err());
    }
}
