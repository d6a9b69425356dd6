use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment overrides: `send_delay_ms` ← `PLUGWATCH_SEND_DELAY_MS`.
const ENV_PREFIX: &str = "PLUGWATCH_";

/// All plugwatch parameters. Defaults, overridden by `PLUGWATCH_*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlugwatchCfg {
    // notification timing (ms)
    pub send_delay_ms: u64,
    pub send_pacing_ms: u64,

    // power source
    pub poll_interval_ms: u64,
    pub power_supply_dir: PathBuf,

    // persistence
    pub data_file: PathBuf,

    // message text
    pub default_disconnect_template: String,
    pub default_connect_template: String,
    pub test_message_prefix: String,

    // shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for PlugwatchCfg {
    fn default() -> Self {
        Self {
            send_delay_ms: 60_000,
            send_pacing_ms: 500,
            poll_interval_ms: 1_000,
            power_supply_dir: PathBuf::from("/sys/class/power_supply"),
            data_file: default_data_file(),
            default_disconnect_template: "Corte Energia ".into(),
            default_connect_template: "Energia restaurada ".into(),
            test_message_prefix: "SMS prueba ".into(),
            shutdown_timeout_secs: 5,
        }
    }
}

impl PlugwatchCfg {
    /// Load config from `PLUGWATCH_*` environment variables over defaults.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX).map(|key| (key.to_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            send_delay_ms: get_or(m, "send_delay_ms", d.send_delay_ms),
            send_pacing_ms: get_or(m, "send_pacing_ms", d.send_pacing_ms),
            poll_interval_ms: get_or(m, "poll_interval_ms", d.poll_interval_ms).max(50),
            power_supply_dir: get_or(m, "power_supply_dir", d.power_supply_dir),
            data_file: get_or(m, "data_file", d.data_file),
            default_disconnect_template: get_or(m, "default_disconnect_template", d.default_disconnect_template),
            default_connect_template: get_or(m, "default_connect_template", d.default_connect_template),
            test_message_prefix: get_or(m, "test_message_prefix", d.test_message_prefix),
            shutdown_timeout_secs: get_or(m, "shutdown_timeout_secs", d.shutdown_timeout_secs),
        }
    }

    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("send_delay_ms", self.send_delay_ms.to_string(), "Delay between power event and SMS"),
            ("send_pacing_ms", self.send_pacing_ms.to_string(), "Pause between consecutive recipients"),
            ("poll_interval_ms", self.poll_interval_ms.to_string(), "Power supply poll interval"),
            ("power_supply_dir", self.power_supply_dir.display().to_string(), "sysfs power_supply class directory"),
            ("data_file", self.data_file.display().to_string(), "Contacts and templates file"),
            ("default_disconnect_template", self.default_disconnect_template.clone(), "Fallback unplug message"),
            ("default_connect_template", self.default_connect_template.clone(), "Fallback replug message"),
            ("test_message_prefix", self.test_message_prefix.clone(), "Test SMS text"),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs.to_string(), "Graceful shutdown timeout seconds"),
        ]
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn send_pacing(&self) -> Duration {
        Duration::from_millis(self.send_pacing_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_data_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("plugwatch")
        .join("state.json")
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PlugwatchCfg::default();
        assert_eq!(cfg.send_delay(), Duration::from_secs(60));
        assert_eq!(cfg.send_pacing(), Duration::from_millis(500));
        assert!(cfg.data_file.ends_with("plugwatch/state.json"));
    }

    #[test]
    fn map_overrides_and_bad_values() {
        let mut m = HashMap::new();
        m.insert("send_delay_ms".to_string(), "1500".to_string());
        m.insert("send_pacing_ms".to_string(), "not-a-number".to_string());
        m.insert("default_connect_template".to_string(), "Power up ".to_string());
        m.insert("poll_interval_ms".to_string(), "1".to_string());

        let cfg = PlugwatchCfg::from_map(&m);
        assert_eq!(cfg.send_delay_ms, 1500);
        assert_eq!(cfg.send_pacing_ms, 500);
        assert_eq!(cfg.default_connect_template, "Power up ");
        // clamped to avoid a busy poll loop
        assert_eq!(cfg.poll_interval_ms, 50);
    }

    #[test]
    fn entries_cover_every_key() {
        let cfg = PlugwatchCfg::default();
        let entries = cfg.to_entries();
        assert_eq!(entries.len(), 9);
        assert!(entries.iter().any(|(k, v, _)| *k == "send_delay_ms" && v == "60000"));
    }
}
