use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display format for every timestamp shown to users or embedded in an SMS.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M:%S";

/// Render a timestamp in local time, e.g. `14/10/26 21:07:33`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

/// A notification recipient. Duplicates are allowed; list order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(rename = "phone")]
    pub address: String,
}

impl Contact {
    /// Build a contact from user input. Returns `None` if either field is blank.
    pub fn parse(name: &str, address: &str) -> Option<Self> {
        let name = name.trim();
        let address = address.trim();
        if name.is_empty() || address.is_empty() {
            return None;
        }
        Some(Self { name: name.to_owned(), address: address.to_owned() })
    }
}

/// The two user-editable message prefixes. The event time is appended at render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplates {
    pub disconnect: String,
    pub connect: String,
}

impl MessageTemplates {
    pub fn get(&self, kind: NotificationKind) -> &str {
        match kind {
            NotificationKind::Disconnect => &self.disconnect,
            NotificationKind::Connect => &self.connect,
        }
    }

    pub fn set(&mut self, kind: NotificationKind, text: impl Into<String>) {
        match kind {
            NotificationKind::Disconnect => self.disconnect = text.into(),
            NotificationKind::Connect => self.connect = text.into(),
        }
    }

    /// `template + formatted event time`.
    pub fn render(&self, kind: NotificationKind, event_at: DateTime<Utc>) -> String {
        format!("{}{}", self.get(kind), format_timestamp(event_at))
    }
}

/// Which power edge a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Plugged → unplugged.
    Disconnect,
    /// Unplugged → plugged.
    Connect,
}

impl NotificationKind {
    /// Capitalized label used in the queue report.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnect => "Desconexión",
            Self::Connect => "Conexión",
        }
    }

    /// Lower-case label used inside sentences.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Disconnect => "desconexión",
            Self::Connect => "conexión",
        }
    }

    /// Kind implied by moving into the given plugged state.
    pub fn from_plugged(plugged: bool) -> Self {
        if plugged { Self::Connect } else { Self::Disconnect }
    }
}

/// Handle of a queued notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A rendered message waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub message: String,
    pub event_at: DateTime<Utc>,
    pub send_at: DateTime<Utc>,
}

/// Snapshot broadcast by the runtime for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStatus {
    /// `None` until the first power sample has been read.
    pub plugged: Option<bool>,
    pub pending: usize,
    pub contacts: usize,
    pub samples: u64,
}
