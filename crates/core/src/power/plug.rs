use serde::{Deserialize, Serialize};

/// Where the device is drawing power from.
///
/// Codes follow the Android `BatteryManager.BATTERY_PLUGGED_*` values so that
/// reports from phone-side relays can be fed in unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlugType {
    /// Running on battery, or the source reported an unknown code.
    Unplugged,
    Ac,
    Usb,
    Wireless,
}

pub const PLUGGED_AC: i32 = 1;
pub const PLUGGED_USB: i32 = 2;
pub const PLUGGED_WIRELESS: i32 = 4;

impl PlugType {
    pub fn from_code(code: i32) -> Self {
        match code {
            PLUGGED_AC => Self::Ac,
            PLUGGED_USB => Self::Usb,
            PLUGGED_WIRELESS => Self::Wireless,
            _ => Self::Unplugged,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unplugged => 0,
            Self::Ac => PLUGGED_AC,
            Self::Usb => PLUGGED_USB,
            Self::Wireless => PLUGGED_WIRELESS,
        }
    }

    /// True for AC, USB and wireless.
    pub fn is_plugged(self) -> bool {
        !matches!(self, Self::Unplugged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping() {
        assert_eq!(PlugType::from_code(1), PlugType::Ac);
        assert_eq!(PlugType::from_code(2), PlugType::Usb);
        assert_eq!(PlugType::from_code(4), PlugType::Wireless);
        assert_eq!(PlugType::from_code(0), PlugType::Unplugged);
        assert_eq!(PlugType::from_code(-1), PlugType::Unplugged);
        assert_eq!(PlugType::from_code(8), PlugType::Unplugged);
    }

    #[test]
    fn plugged_set_membership() {
        for code in [1, 2, 4] {
            assert!(PlugType::from_code(code).is_plugged());
        }
        for code in [-1, 0, 3, 8, 16] {
            assert!(!PlugType::from_code(code).is_plugged());
        }
    }

    #[test]
    fn code_round_trip() {
        for p in [PlugType::Unplugged, PlugType::Ac, PlugType::Usb, PlugType::Wireless] {
            assert_eq!(PlugType::from_code(p.code()), p);
        }
    }
}
