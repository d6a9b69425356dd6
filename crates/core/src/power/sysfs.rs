use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::power::plug::PlugType;
use crate::power::source::PowerSource;

/// Reads external supplies from the Linux `power_supply` class.
///
/// Each entry has a `type` file (`Mains`, `USB`, `USB_C`, `Wireless`, `Battery`, ...)
/// and, for external supplies, an `online` file holding `0` or `1`.
#[derive(Debug, Clone)]
pub struct SysfsPowerSource {
    dir: PathBuf,
}

impl SysfsPowerSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Map a sysfs `type` value to a plug type. Batteries and unknown types map to `None`.
    fn classify(kind: &str) -> Option<PlugType> {
        match kind.trim() {
            "Mains" => Some(PlugType::Ac),
            "Wireless" => Some(PlugType::Wireless),
            k if k.starts_with("USB") => Some(PlugType::Usb),
            _ => None,
        }
    }

    fn read_supply(path: &Path) -> Option<PlugType> {
        let kind = fs::read_to_string(path.join("type")).ok()?;
        let plug = Self::classify(&kind)?;
        let online = fs::read_to_string(path.join("online")).ok()?;
        (online.trim() == "1").then_some(plug)
    }
}

impl PowerSource for SysfsPowerSource {
    fn name(&self) -> &str {
        "sysfs"
    }

    /// First online external supply wins, in directory-name order.
    fn sample(&self) -> io::Result<PlugType> {
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        Ok(entries
            .iter()
            .find_map(|p| Self::read_supply(p))
            .unwrap_or(PlugType::Unplugged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supply(root: &Path, name: &str, kind: &str, online: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), format!("{kind}\n")).unwrap();
        if let Some(online) = online {
            fs::write(dir.join("online"), format!("{online}\n")).unwrap();
        }
    }

    #[test]
    fn mains_online_is_ac() {
        let tmp = tempfile::tempdir().unwrap();
        supply(tmp.path(), "AC", "Mains", Some("1"));
        supply(tmp.path(), "BAT0", "Battery", None);
        let src = SysfsPowerSource::new(tmp.path());
        assert_eq!(src.sample().unwrap(), PlugType::Ac);
    }

    #[test]
    fn offline_supplies_mean_unplugged() {
        let tmp = tempfile::tempdir().unwrap();
        supply(tmp.path(), "AC", "Mains", Some("0"));
        supply(tmp.path(), "ucsi-source-psy-1", "USB", Some("0"));
        supply(tmp.path(), "BAT0", "Battery", None);
        let src = SysfsPowerSource::new(tmp.path());
        assert_eq!(src.sample().unwrap(), PlugType::Unplugged);
    }

    #[test]
    fn usb_variants_classified() {
        let tmp = tempfile::tempdir().unwrap();
        supply(tmp.path(), "AC", "Mains", Some("0"));
        supply(tmp.path(), "usb-c", "USB_C", Some("1"));
        let src = SysfsPowerSource::new(tmp.path());
        assert_eq!(src.sample().unwrap(), PlugType::Usb);
    }

    #[test]
    fn missing_dir_is_an_error() {
        let src = SysfsPowerSource::new("/nonexistent/plugwatch/power_supply");
        assert!(src.sample().is_err());
    }
}
