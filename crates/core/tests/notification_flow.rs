//! End-to-end tests for the power → queue → SMS pipeline.
//!
//! Everything runs against the in-process mock gateway with tokio's paused
//! clock, so the 60 s delay and the 500 ms pacing are observed exactly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use plugwatch_core::config::PlugwatchCfg;
use plugwatch_core::controller::{Controller, INVALID_CONTACT};
use plugwatch_core::io::notice::{self, NoticeReceiver};
use plugwatch_core::notify::NO_PENDING;
use plugwatch_core::permission::StaticPermission;
use plugwatch_core::power::{Observation, PowerMonitor, PowerStateListener, SysfsPowerSource};
use plugwatch_core::runtime::Runtime;
use plugwatch_core::store::{ContactStore, FileStore, KvStore, MemoryStore};
use plugwatch_core::types::{MessageTemplates, NotificationKind, format_timestamp};
use plugwatch_sms::MockGateway;

struct Harness {
    controller: Arc<Controller>,
    mock: Arc<MockGateway>,
    notices: NoticeReceiver,
}

fn harness(kv: Arc<dyn KvStore>) -> Harness {
    let cfg = Arc::new(PlugwatchCfg::default());
    let mock = Arc::new(MockGateway::new());
    let (tx, rx) = notice::channel();
    let store = ContactStore::new(
        kv,
        MessageTemplates {
            disconnect: cfg.default_disconnect_template.clone(),
            connect: cfg.default_connect_template.clone(),
        },
    );
    let controller =
        Controller::new(cfg, store, mock.clone(), Arc::new(StaticPermission::granted()), tx);
    Harness { controller, mock, notices: rx }
}

fn drain(rx: &mut NoticeReceiver) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n.content);
    }
    out
}

/// Two contacts, custom connect template, one replug: both get the same text,
/// in list order, at least the pacing apart, after the full delay.
#[tokio::test(start_paused = true)]
async fn connect_reaches_every_contact_in_order() {
    let h = harness(Arc::new(MemoryStore::new()));
    assert!(h.controller.add_contact("Alice", "+111").await);
    assert!(h.controller.add_contact("Bob", "+222").await);
    h.controller.set_template(NotificationKind::Connect, "Power up ").await;

    h.controller.prime(false);
    let t = Utc::now();
    h.controller.on_power_state_changed(true, t);

    let report = h.controller.pending_report();
    assert_eq!(
        report,
        format!(
            "SMS programados (1):\n1. Conexión - Evento: {} - Envío: {}\n",
            format_timestamp(t),
            format_timestamp(t + TimeDelta::seconds(60))
        )
    );

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.mock.sent_count(), 0, "nothing goes out before the delay");

    tokio::time::sleep(Duration::from_secs(5)).await;
    let sent = h.mock.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].sms.to, "+111");
    assert_eq!(sent[1].sms.to, "+222");
    let expected = format!("Power up {}", format_timestamp(t));
    assert!(sent.iter().all(|s| s.sms.body == expected));
    assert!(sent[1].at - sent[0].at >= Duration::from_millis(500));

    assert_eq!(h.controller.pending_report(), NO_PENDING);
}

#[tokio::test(start_paused = true)]
async fn transition_without_contacts_only_warns() {
    let mut h = harness(Arc::new(MemoryStore::new()));
    h.controller.prime(true);
    h.controller.on_power_state_changed(false, Utc::now());

    assert_eq!(drain(&mut h.notices), ["No hay contactos para enviar SMS"]);
    assert_eq!(h.controller.pending_report(), NO_PENDING);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.mock.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_all_stops_queued_notifications() {
    let h = harness(Arc::new(MemoryStore::new()));
    h.controller.add_contact("Alice", "+111").await;
    h.controller.prime(true);
    h.controller.on_power_state_changed(false, Utc::now());
    h.controller.on_power_state_changed(true, Utc::now());
    assert_eq!(h.controller.pending().len(), 2);

    assert_eq!(h.controller.shutdown(), 2);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.mock.sent_count(), 0);
}

/// Teardown right after the timer fires drops nothing: the batch already
/// started keeps its pacing and reaches every contact.
#[tokio::test(start_paused = true)]
async fn started_batch_survives_shutdown() {
    let h = harness(Arc::new(MemoryStore::new()));
    h.controller.add_contact("Alice", "+111").await;
    h.controller.add_contact("Bob", "+222").await;
    h.controller.add_contact("Carol", "+333").await;
    h.controller.prime(true);
    h.controller.on_power_state_changed(false, Utc::now());

    tokio::time::sleep(Duration::from_secs(60) + Duration::from_millis(100)).await;
    assert_eq!(h.mock.sent_count(), 1);
    assert_eq!(h.controller.shutdown(), 0, "the fired entry already left the queue");

    tokio::time::sleep(Duration::from_secs(2)).await;
    let to: Vec<_> = h.mock.sent().iter().map(|s| s.sms.to.clone()).collect();
    assert_eq!(to, ["+111", "+222", "+333"]);
}

#[tokio::test]
async fn blank_contact_never_reaches_the_store() {
    let kv = Arc::new(MemoryStore::new());
    let mut h = harness(kv.clone());
    assert!(!h.controller.add_contact("", "+111").await);
    assert!(!h.controller.add_contact("Alice", "").await);
    assert_eq!(kv.write_count(), 0);
    assert_eq!(drain(&mut h.notices), [INVALID_CONTACT, INVALID_CONTACT]);
}

#[tokio::test]
async fn contacts_survive_restart_on_file_store() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("state.json");

    let first = harness(Arc::new(FileStore::new(&path)));
    first.controller.add_contact("Alice", "+111").await;
    first.controller.add_contact("Bob", "+222").await;
    first.controller.set_template(NotificationKind::Disconnect, "Apagón ").await;

    let second = harness(Arc::new(FileStore::new(&path)));
    second.controller.load().await;
    assert_eq!(second.controller.contacts(), first.controller.contacts());
    assert_eq!(second.controller.templates().disconnect, "Apagón ");

    // An emptied list round-trips as empty, not as missing.
    second.controller.delete_contact(0).await;
    second.controller.delete_contact(0).await;
    let third = harness(Arc::new(FileStore::new(&path)));
    third.controller.load().await;
    assert!(third.controller.contacts().is_empty());
}

#[test]
fn plug_code_sequence_yields_alternating_edges() {
    let mut monitor = PowerMonitor::new();
    let at = Utc::now();
    let kinds: Vec<_> = [0, 1, 1, 2, 0, 0, 4, 0]
        .into_iter()
        .filter_map(|code| match monitor.observe_code(code, at, true) {
            Observation::Transition(t) => Some(t.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        [
            NotificationKind::Connect,
            NotificationKind::Disconnect,
            NotificationKind::Connect,
            NotificationKind::Disconnect,
        ]
    );
}

fn fake_supply(dir: &std::path::Path, name: &str, kind: &str, online: bool) {
    let supply = dir.join(name);
    std::fs::create_dir_all(&supply).unwrap();
    std::fs::write(supply.join("type"), format!("{kind}\n")).unwrap();
    std::fs::write(supply.join("online"), if online { "1\n" } else { "0\n" }).unwrap();
}

/// Runtime polling a fake sysfs tree: unplugging the mains supply schedules a
/// disconnect that is delivered after the delay.
#[tokio::test(start_paused = true)]
async fn runtime_follows_sysfs_supply() {
    let tmp = tempfile::tempdir().unwrap();
    fake_supply(tmp.path(), "AC", "Mains", true);
    fake_supply(tmp.path(), "BAT0", "Battery", false);

    let mut m = HashMap::new();
    m.insert("poll_interval_ms".to_string(), "100".to_string());
    let cfg = Arc::new(PlugwatchCfg::from_map(&m));
    let mock = Arc::new(MockGateway::new());
    let (mut runtime, controller, _notices, status) = Runtime::new(
        cfg,
        Arc::new(MemoryStore::new()),
        mock.clone(),
        Arc::new(SysfsPowerSource::new(tmp.path())),
    );
    controller.add_contact("Alice", "+111").await;

    let token = runtime.token();
    let handle = tokio::spawn(async move { runtime.run().await });
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(status.borrow().plugged, Some(true));

    fake_supply(tmp.path(), "AC", "Mains", false);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(status.borrow().pending, 1);
    assert_eq!(controller.pending()[0].kind, NotificationKind::Disconnect);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(mock.sent_count(), 1);

    token.cancel();
    handle.await.unwrap();
}
