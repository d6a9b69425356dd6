use std::sync::Arc;

use plugwatch_sms::{MockGateway, SmsGateway};

use crate::config::PlugwatchCfg;
use crate::store::{FileStore, KvStore, MemoryStore, PgStore};

const DB_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Store and gateway picked from the environment, plus what to tell the user
/// about any downgrade.
pub struct Backends {
    pub kv: Arc<dyn KvStore>,
    pub gateway: Arc<dyn SmsGateway>,
    pub startup_notices: Vec<String>,
}

impl Backends {
    pub async fn from_env(cfg: &PlugwatchCfg) -> Self {
        let mut startup_notices = Vec::new();
        let kv = open_store(cfg, std::env::var("DATABASE_URL").ok(), &mut startup_notices).await;
        let gateway: Arc<dyn SmsGateway> = match plugwatch_sms::http::from_env() {
            Some(g) => {
                tracing::info!(name = g.name(), "sms gateway initialized");
                Arc::new(g)
            }
            None => {
                tracing::warn!("PLUGWATCH_SMS_PROVIDER not set or incomplete, using dry-run gateway");
                startup_notices.push(
                    "Sin proveedor SMS configurado: modo de prueba, los mensajes solo se registran."
                        .to_owned(),
                );
                Arc::new(MockGateway::dry_run())
            }
        };
        Self { kv, gateway, startup_notices }
    }
}

/// Postgres when a URL is given and reachable, else the JSON file, else
/// memory. Every downgrade adds a notice.
pub async fn open_store(
    cfg: &PlugwatchCfg,
    database_url: Option<String>,
    notices: &mut Vec<String>,
) -> Arc<dyn KvStore> {
    if let Some(url) = database_url {
        match PgStore::connect(&url, DB_CONNECT_TIMEOUT_SECS).await {
            Ok(store) => {
                tracing::info!("database connected and migrations applied");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(error = %e, "database unavailable, falling back to file store");
                notices.push(format!("Aviso: base de datos no disponible ({e}), usando archivo local."));
            }
        }
    }

    let file = FileStore::new(&cfg.data_file);
    match file.ensure_parent().await {
        Ok(()) => {
            tracing::info!(path = %cfg.data_file.display(), "using file store");
            Arc::new(file)
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %cfg.data_file.display(), "data file unusable, using memory store");
            notices.push(format!(
                "Aviso: no se puede usar {} ({e}); los datos no se guardarán.",
                cfg.data_file.display()
            ));
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_with_data_file(path: &std::path::Path) -> PlugwatchCfg {
        let mut m = HashMap::new();
        m.insert("data_file".to_string(), path.display().to_string());
        PlugwatchCfg::from_map(&m)
    }

    #[tokio::test]
    async fn file_store_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = cfg_with_data_file(&tmp.path().join("state.json"));
        let mut notices = Vec::new();
        let kv = open_store(&cfg, None, &mut notices).await;
        assert_eq!(kv.name(), "file");
        assert!(notices.is_empty());
    }

    #[tokio::test]
    async fn unreadable_file_falls_back_to_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "garbage").unwrap();
        let mut notices = Vec::new();
        let kv = open_store(&cfg_with_data_file(&path), None, &mut notices).await;
        assert_eq!(kv.name(), "memory");
        assert_eq!(notices.len(), 1);
    }
}
