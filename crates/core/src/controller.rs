use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use plugwatch_sms::SmsGateway;
use tokio::task::JoinHandle;

use crate::config::PlugwatchCfg;
use crate::io::notice::NoticeSender;
use crate::notify::dispatch::NO_CONTACTS;
use crate::notify::{DispatchReport, Dispatcher, NotificationScheduler};
use crate::permission::PermissionGate;
use crate::power::{Observation, PowerMonitor, PowerStateListener};
use crate::state::AppState;
use crate::store::ContactStore;
use crate::types::{
    Contact, MessageTemplates, NotificationKind, RuntimeStatus, ScheduledNotification,
    format_timestamp,
};

pub const INVALID_CONTACT: &str = "Nombre y teléfono no pueden estar vacíos";

/// Glue between the power monitor, the scheduler and the user-facing surface.
///
/// Every UI talks to this type; it owns the in-memory state and writes every
/// contact or template edit through to the store before returning.
pub struct Controller {
    cfg: Arc<PlugwatchCfg>,
    state: Arc<AppState>,
    store: ContactStore,
    scheduler: Arc<NotificationScheduler>,
    dispatcher: Dispatcher,
    permission: Arc<dyn PermissionGate>,
    notices: NoticeSender,
    /// `None` until the first sample or an explicit prime.
    monitor: Mutex<Option<PowerMonitor>>,
}

impl Controller {
    pub fn new(
        cfg: Arc<PlugwatchCfg>,
        store: ContactStore,
        gateway: Arc<dyn SmsGateway>,
        permission: Arc<dyn PermissionGate>,
        notices: NoticeSender,
    ) -> Arc<Self> {
        let defaults = MessageTemplates {
            disconnect: cfg.default_disconnect_template.clone(),
            connect: cfg.default_connect_template.clone(),
        };
        let state = Arc::new(AppState::new(Vec::new(), defaults));
        let dispatcher = Dispatcher::new(gateway, cfg.send_pacing(), notices.clone());
        let scheduler = NotificationScheduler::new(
            cfg.send_delay(),
            Arc::clone(&state),
            dispatcher.clone(),
            Arc::clone(&permission),
            notices.clone(),
        );
        Arc::new(Self {
            cfg,
            state,
            store,
            scheduler,
            dispatcher,
            permission,
            notices,
            monitor: Mutex::new(None),
        })
    }

    /// Replace in-memory contacts and templates with what the store holds.
    pub async fn load(&self) {
        let contacts = self.store.load_contacts().await;
        let templates = self.store.load_templates().await;
        tracing::info!(
            backend = self.store.backend(),
            contacts = contacts.len(),
            "state loaded"
        );
        self.state.replace_contacts(contacts);
        self.state.replace_templates(templates);
    }

    /// Seed the edge detector with a known state. Never schedules anything.
    pub fn prime(&self, plugged: bool) {
        *self.monitor.lock().unwrap_or_else(PoisonError::into_inner) = Some(PowerMonitor::primed(plugged));
        tracing::debug!(plugged, "power monitor primed");
    }

    /// Validate, append and persist. Returns `false` on blank input, in which
    /// case nothing is written.
    pub async fn add_contact(&self, name: &str, phone: &str) -> bool {
        let Some(contact) = Contact::parse(name, phone) else {
            self.notices.warn(INVALID_CONTACT);
            return false;
        };
        let label = contact.name.clone();
        let list = self.state.push_contact(contact);
        self.persist_contacts(&list).await;
        tracing::info!(name = %label, total = list.len(), "contact added");
        self.notices.info(format!("Contacto agregado: {label}"));
        true
    }

    /// Remove by list position and persist. Out-of-range is a no-op.
    pub async fn delete_contact(&self, index: usize) -> Option<Contact> {
        let Some((removed, list)) = self.state.remove_contact(index) else {
            tracing::debug!(index, "delete_contact index out of range");
            return None;
        };
        self.persist_contacts(&list).await;
        tracing::info!(name = %removed.name, total = list.len(), "contact removed");
        self.notices.info(format!("Contacto eliminado: {}", removed.name));
        Some(removed)
    }

    /// Replace one template and persist both.
    pub async fn set_template(&self, kind: NotificationKind, text: &str) {
        let templates = self.state.set_template(kind, text);
        if let Err(e) = self.store.save_templates(&templates).await {
            tracing::error!(error = %e, "failed to persist templates");
            self.notices.error(format!("No se pudo guardar la plantilla: {e}"));
            return;
        }
        self.notices.info(format!("Plantilla de {} guardada", kind.noun()));
    }

    /// Send the test message to everyone right now, bypassing the queue.
    pub fn test_send(&self) -> Option<JoinHandle<DispatchReport>> {
        if !self.state.has_contacts() {
            self.notices.warn(NO_CONTACTS);
            return None;
        }
        if !self.permission.is_granted() {
            self.notices.warn("Se requiere permiso para enviar SMS");
            self.permission.request();
            return None;
        }
        let message = format!("{}{}", self.cfg.test_message_prefix, format_timestamp(Utc::now()));
        let handle = self.dispatcher.send_to_all(message, self.state.contacts())?;
        self.notices.info("SMS de prueba enviado");
        Some(handle)
    }

    pub fn pending_report(&self) -> String {
        self.scheduler.describe_pending()
    }

    pub fn pending(&self) -> Vec<ScheduledNotification> {
        self.scheduler.pending()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.state.contacts()
    }

    pub fn templates(&self) -> MessageTemplates {
        self.state.templates()
    }

    pub fn cfg(&self) -> &PlugwatchCfg {
        &self.cfg
    }

    pub fn gateway_name(&self) -> &str {
        self.dispatcher.gateway_name()
    }

    pub fn permission_granted(&self) -> bool {
        self.permission.is_granted()
    }

    pub fn request_permission(&self) {
        self.permission.request();
    }

    pub fn status(&self) -> RuntimeStatus {
        let monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        RuntimeStatus {
            plugged: monitor.as_ref().map(PowerMonitor::is_plugged),
            pending: self.scheduler.len(),
            contacts: self.state.contact_count(),
            samples: monitor.as_ref().map_or(0, PowerMonitor::samples),
        }
    }

    /// Drop every pending notification. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        self.scheduler.cancel_all()
    }

    async fn persist_contacts(&self, list: &[Contact]) {
        if let Err(e) = self.store.save_contacts(list).await {
            tracing::error!(error = %e, backend = self.store.backend(), "failed to persist contacts");
            self.notices.error(format!("No se pudo guardar los contactos: {e}"));
        }
    }
}

impl PowerStateListener for Controller {
    fn on_power_state_changed(&self, is_plugged: bool, at: DateTime<Utc>) {
        let observation = {
            let mut monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
            monitor
                .get_or_insert_with(PowerMonitor::new)
                .observe(is_plugged, at, self.state.has_contacts())
        };
        match observation {
            Observation::Unchanged => {}
            Observation::Transition(t) => {
                tracing::info!(kind = ?t.kind, at = %t.at, "power transition");
                self.scheduler.schedule(t.kind, t.at);
            }
            Observation::Suppressed(kind) => {
                tracing::info!(kind = ?kind, "power transition with no contacts, not scheduled");
                self.notices.warn(NO_CONTACTS);
            }
        }
    }
}
