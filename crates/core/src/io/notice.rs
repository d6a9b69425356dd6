use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// A transient, human-readable message for whatever UI is attached.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn info(content: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, content)
    }

    pub fn warn(content: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warn, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, content)
    }

    fn new(level: NoticeLevel, content: impl Into<String>) -> Self {
        Self { level, content: content.into(), at: Utc::now() }
    }
}

/// Notice channel sender. Cloned into every component that reports to the user.
#[derive(Debug, Clone)]
pub struct NoticeSender {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeSender {
    /// Deliver a notice. A closed UI is not an error for the sender.
    pub fn send(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!("notice dropped, no receiver attached");
        }
    }

    pub fn info(&self, content: impl Into<String>) {
        self.send(Notice::info(content));
    }

    pub fn warn(&self, content: impl Into<String>) {
        self.send(Notice::warn(content));
    }

    pub fn error(&self, content: impl Into<String>) {
        self.send(Notice::error(content));
    }
}

/// Notice channel receiver. The presentation layer drains this.
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// Create a notice channel.
pub fn channel() -> (NoticeSender, NoticeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NoticeSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_level() {
        assert_eq!(Notice::info("a").level, NoticeLevel::Info);
        assert_eq!(Notice::warn("b").level, NoticeLevel::Warn);
        assert_eq!(Notice::error("c").level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn channel_send_recv() {
        let (tx, mut rx) = channel();
        tx.info("SMS de prueba enviado");
        let n = rx.recv().await.unwrap();
        assert_eq!(n.content, "SMS de prueba enviado");
        assert_eq!(n.level, NoticeLevel::Info);
    }

    #[test]
    fn send_without_receiver_is_silent() {
        let (tx, rx) = channel();
        drop(rx);
        tx.error("nobody listening");
    }
}
