mod event;
mod tui;
mod widgets;

use std::sync::Arc;

use plugwatch_core::config::PlugwatchCfg;
use plugwatch_core::power::SysfsPowerSource;
use plugwatch_core::runtime::{Backends, Runtime};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Panic hook: restore terminal even on panic in raw mode
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen);
        default_hook(info);
    }));

    // Tracing: write to file when RUST_LOG is set (raw mode breaks stderr)
    if std::env::var("RUST_LOG").is_ok() {
        let file = std::fs::File::create("/tmp/plugwatch.log")?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
    }

    let cfg = Arc::new(PlugwatchCfg::from_env());
    let Backends { kv, gateway, startup_notices } = Backends::from_env(&cfg).await;
    let source = Arc::new(SysfsPowerSource::new(&cfg.power_supply_dir));
    tracing::info!(dir = %cfg.power_supply_dir.display(), "power source configured");

    let (mut runtime, controller, notice_rx, status_rx) =
        Runtime::new(Arc::clone(&cfg), kv, gateway, source);
    let token = runtime.token();

    // If the TUI exits first, cancel the runtime and let it drop the queue.
    // If the runtime exits first (signal), cancel the TUI and wait for terminal cleanup.
    let tui_token = token.clone();
    let runtime_fut = runtime.run();
    let tui_fut = tui::run_app(controller, notice_rx, status_rx, tui_token, startup_notices);
    tokio::pin!(runtime_fut);
    tokio::pin!(tui_fut);

    let mut runtime_done = false;
    let mut tui_result: Option<anyhow::Result<()>> = None;

    loop {
        tokio::select! {
            _ = &mut runtime_fut, if !runtime_done => {
                runtime_done = true;
                token.cancel();
                if tui_result.is_none() {
                    tui_result = Some((&mut tui_fut).await);
                }
            }
            result = &mut tui_fut, if tui_result.is_none() => {
                tui_result = Some(result);
                token.cancel();
            }
        }

        if runtime_done && tui_result.is_some() {
            break;
        }
    }

    tui_result.unwrap_or(Ok(()))
}
