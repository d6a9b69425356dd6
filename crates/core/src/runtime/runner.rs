use std::sync::Arc;

use chrono::Utc;
use plugwatch_sms::SmsGateway;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::shutdown::ShutdownGuard;
use crate::config::PlugwatchCfg;
use crate::controller::Controller;
use crate::io::notice::{self, NoticeReceiver, NoticeSender};
use crate::permission::{GatewayPermission, PermissionGate};
use crate::power::{PowerSource, PowerStateListener};
use crate::store::{ContactStore, KvStore};
use crate::types::{MessageTemplates, RuntimeStatus};

/// Drives the power poll loop until shutdown.
pub struct Runtime {
    cfg: Arc<PlugwatchCfg>,
    shutdown: ShutdownGuard,
    controller: Arc<Controller>,
    permission: Arc<dyn PermissionGate>,
    source: Arc<dyn PowerSource>,
    notices: NoticeSender,
    /// Status watch channel, refreshed after every sample for the status bar.
    status_tx: watch::Sender<RuntimeStatus>,
    /// Set while the source keeps failing, so the failure is reported once.
    source_failing: bool,
}

impl Runtime {
    /// Wire everything together. Returns (Runtime, controller, notice receiver, status receiver).
    ///
    /// The controller is the handle UIs use for edits and queries; notices and
    /// status are the two streams they render.
    pub fn new(
        cfg: Arc<PlugwatchCfg>,
        kv: Arc<dyn KvStore>,
        gateway: Arc<dyn SmsGateway>,
        source: Arc<dyn PowerSource>,
    ) -> (Self, Arc<Controller>, NoticeReceiver, watch::Receiver<RuntimeStatus>) {
        let (notices, notice_rx) = notice::channel();
        let permission: Arc<dyn PermissionGate> =
            Arc::new(GatewayPermission::new(Arc::clone(&gateway), notices.clone()));
        let store = ContactStore::new(
            kv,
            MessageTemplates {
                disconnect: cfg.default_disconnect_template.clone(),
                connect: cfg.default_connect_template.clone(),
            },
        );
        let controller = Controller::new(
            Arc::clone(&cfg),
            store,
            gateway,
            Arc::clone(&permission),
            notices.clone(),
        );
        let (status_tx, status_rx) = watch::channel(RuntimeStatus::default());
        let runtime = Self {
            cfg,
            shutdown: ShutdownGuard::new(),
            controller: Arc::clone(&controller),
            permission,
            source,
            notices,
            status_tx,
            source_failing: false,
        };
        (runtime, controller, notice_rx, status_rx)
    }

    pub async fn run(&mut self) {
        self.shutdown.spawn_signal_listener();
        let token = self.shutdown.token();

        self.controller.load().await;
        match self.source.sample() {
            Ok(plug) => self.controller.prime(plug.is_plugged()),
            Err(e) => self.report_source_error(&e),
        }
        self.permission.request();
        self.publish_status();

        tracing::info!(
            source = self.source.name(),
            gateway = self.controller.gateway_name(),
            poll_ms = self.cfg.poll_interval_ms,
            delay_ms = self.cfg.send_delay_ms,
            "plugwatch runtime started"
        );

        let mut poll = tokio::time::interval(self.cfg.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately and the state was just primed.
        poll.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = poll.tick() => self.poll_once(),
            }
        }

        let dropped = self.controller.shutdown();
        self.publish_status();
        tracing::info!(dropped, "plugwatch runtime stopped");
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    fn poll_once(&mut self) {
        match self.source.sample() {
            Ok(plug) => {
                if self.source_failing {
                    self.source_failing = false;
                    tracing::info!(source = self.source.name(), "power source readable again");
                }
                self.controller.on_power_state_changed(plug.is_plugged(), Utc::now());
            }
            Err(e) => self.report_source_error(&e),
        }
        self.publish_status();
    }

    fn report_source_error(&mut self, e: &std::io::Error) {
        if self.source_failing {
            return;
        }
        self.source_failing = true;
        tracing::warn!(source = self.source.name(), error = %e, "power source read failed");
        self.notices.warn(format!("No se pudo leer el estado de carga: {e}"));
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(self.controller.status());
    }
}
