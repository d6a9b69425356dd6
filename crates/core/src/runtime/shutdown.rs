use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Owns the process-wide cancellation token.
///
/// The poll loop, the UI and the signal listener all hold clones; cancelling
/// any of them stops the daemon.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token on SIGTERM or SIGHUP (Ctrl+C elsewhere).
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use signal::unix::{SignalKind, signal as unix_signal};
                let (mut term, mut hup) =
                    match (unix_signal(SignalKind::terminate()), unix_signal(SignalKind::hangup())) {
                        (Ok(term), Ok(hup)) => (term, hup),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::warn!(error = %e, "failed to register signal handlers");
                            return;
                        }
                    };
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = term.recv() => tracing::info!("received SIGTERM, shutting down"),
                    _ = hup.recv() => tracing::info!("received SIGHUP, shutting down"),
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, shutting down"),
                }
            }
            token.cancel();
        });
    }
}
