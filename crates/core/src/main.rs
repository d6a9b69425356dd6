use std::sync::Arc;
use std::time::Duration;

use plugwatch_core::config::PlugwatchCfg;
use plugwatch_core::controller::Controller;
use plugwatch_core::io::notice::{Notice, NoticeLevel, NoticeReceiver};
use plugwatch_core::power::SysfsPowerSource;
use plugwatch_core::runtime::{Backends, Runtime};
use plugwatch_core::types::{NotificationKind, format_timestamp};
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
Comandos:
  add <nombre> <teléfono>        agregar contacto
  del <n>                        eliminar contacto n
  list                           listar contactos
  template disconnect|connect <texto>
  templates                      mostrar plantillas
  test                           enviar SMS de prueba
  perm                           estado del permiso SMS (lo solicita si falta)
  queue                          SMS programados
  config                         configuración actual
  /q                             salir";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cfg = Arc::new(PlugwatchCfg::from_env());
    let Backends { kv, gateway, startup_notices } = Backends::from_env(&cfg).await;
    let source = Arc::new(SysfsPowerSource::new(&cfg.power_supply_dir));

    let (mut runtime, controller, notice_rx, _status_rx) =
        Runtime::new(Arc::clone(&cfg), kv, gateway, source);
    let token = runtime.token();
    spawn_sigint_canceler(token.clone());

    let runtime_fut = runtime.run();
    let repl_fut = run_repl(controller, notice_rx, token.clone(), startup_notices);
    tokio::pin!(runtime_fut);
    tokio::pin!(repl_fut);

    let grace = Duration::from_secs(cfg.shutdown_timeout_secs);
    tokio::select! {
        _ = &mut runtime_fut => {
            token.cancel();
            (&mut repl_fut).await
        }
        result = &mut repl_fut => {
            token.cancel();
            if tokio::time::timeout(grace, &mut runtime_fut).await.is_err() {
                tracing::warn!(secs = cfg.shutdown_timeout_secs, "runtime did not stop in time");
            }
            result
        }
    }
}

async fn run_repl(
    controller: Arc<Controller>,
    mut notice_rx: NoticeReceiver,
    token: CancellationToken,
    startup_notices: Vec<String>,
) -> anyhow::Result<()> {
    for n in startup_notices {
        println!("{n}");
    }
    println!("Detector de Carga. Escriba 'help' para ver los comandos.");

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    spawn_input_thread(line_tx, ready_rx);
    request_next_prompt(&ready_tx);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                match line {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        if matches!(text, "/q" | "/exit" | "/quit") {
                            break;
                        }
                        if !text.is_empty() {
                            run_command(&controller, text).await;
                        }
                        request_next_prompt(&ready_tx);
                    }
                    InputEvent::Interrupted => {
                        token.cancel();
                        break;
                    }
                    InputEvent::Eof => break,
                    InputEvent::Error(err) => {
                        eprintln!("input error: {err}");
                        break;
                    }
                }
            }
            notice = notice_rx.recv() => {
                let Some(notice) = notice else { break };
                print_notice(&notice);
            }
        }
    }
    drop(ready_tx);
    println!();
    Ok(())
}

async fn run_command(controller: &Controller, text: &str) {
    let (cmd, rest) = text.split_once(' ').unwrap_or((text, ""));
    let rest = rest.trim();
    match cmd {
        "help" | "?" => println!("{HELP}"),
        "add" => {
            let (name, phone) = rest.rsplit_once(' ').unwrap_or((rest, ""));
            controller.add_contact(name, phone).await;
        }
        "del" => match rest.parse::<usize>() {
            Ok(n) if n >= 1 => {
                if controller.delete_contact(n - 1).await.is_none() {
                    println!("No existe el contacto {n}");
                }
            }
            _ => println!("Uso: del <n>"),
        },
        "list" => {
            let contacts = controller.contacts();
            if contacts.is_empty() {
                println!("Sin contactos");
            }
            for (i, c) in contacts.iter().enumerate() {
                println!("{}. {} - {}", i + 1, c.name, c.address);
            }
        }
        "template" => {
            let (which, body) = rest.split_once(' ').unwrap_or((rest, ""));
            let kind = match which {
                "disconnect" => NotificationKind::Disconnect,
                "connect" => NotificationKind::Connect,
                _ => {
                    println!("Uso: template disconnect|connect <texto>");
                    return;
                }
            };
            // Keep the trailing space convention so the time reads naturally.
            let body = if body.is_empty() || body.ends_with(' ') { body.to_owned() } else { format!("{body} ") };
            controller.set_template(kind, &body).await;
        }
        "templates" => {
            let t = controller.templates();
            println!("Desconexión: {:?}", t.disconnect);
            println!("Conexión:    {:?}", t.connect);
        }
        "test" => {
            let _ = controller.test_send();
        }
        "perm" => {
            if controller.permission_granted() {
                println!("Permiso concedido para enviar SMS");
            } else {
                println!("Solicitando permiso para enviar SMS...");
                controller.request_permission();
            }
        }
        "queue" => print!("{}", with_newline(controller.pending_report())),
        "config" => {
            for (key, value, desc) in controller.cfg().to_entries() {
                println!("{key:<28} {value:<40} {desc}");
            }
            println!("{:<28} {:<40} SMS gateway", "gateway", controller.gateway_name());
        }
        other => println!("Comando desconocido: {other}. Escriba 'help'."),
    }
}

fn with_newline(mut s: String) -> String {
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "",
        NoticeLevel::Warn => "[aviso] ",
        NoticeLevel::Error => "[error] ",
    };
    println!("\r\x1b[2K{} {tag}{}", format_timestamp(notice.at), notice.content);
}

fn request_next_prompt(ready_tx: &std::sync::mpsc::Sender<()>) {
    let _ = ready_tx.send(());
}

fn spawn_input_thread(
    line_tx: mpsc::UnboundedSender<InputEvent>,
    ready_rx: std::sync::mpsc::Receiver<()>,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while ready_rx.recv().is_ok() {
            match editor.readline("plugwatch> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}

fn spawn_sigint_canceler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}
