//! Constants and plain value types shared by the driver facade and its
//! collaborators.
//!
//! Numeric values of [`WlStatus`] and [`EncType`] follow the Arduino WiFi
//! library so sketches comparing against the usual `WL_*` / `ENC_TYPE_*`
//! numbers keep working. [`Security`] mirrors the vendor driver's combined
//! security/cipher bitset.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Key index length in octets.
pub const KEY_IDX_LEN: usize = 1;

/// Time allowed for an association to complete before it is declared failed.
pub const WL_DELAY_START_CONNECTION: Duration = Duration::from_millis(5000);

/// Firmware version string length.
pub const WL_FW_VER_LENGTH: usize = 6;

/// Hostname length limit, terminator excluded.
pub const HOSTNAME_LEN: usize = 20;

pub const WL_SSID_MAX_LENGTH: usize = 32;
pub const WL_MAC_ADDR_LENGTH: usize = 6;

/// Upper bound on the number of cached scan entries.
pub const WL_NETWORKS_LIST_MAXNUM: usize = 50;

pub const WL_WPA_KEY_MIN_LENGTH: usize = 8;
pub const WL_WPA_KEY_MAX_LENGTH: usize = 63;
pub const WL_WEP_40_KEY_LENGTH: usize = 5;
pub const WL_WEP_104_KEY_LENGTH: usize = 13;
pub const WL_WEP_KEY_INDEX_MAX: u8 = 3;

pub const WL_SUCCESS: i32 = 1;
pub const WL_FAILURE: i32 = 0;

/// 6-octet hardware address (station MAC or AP BSSID).
pub type MacAddress = [u8; WL_MAC_ADDR_LENGTH];

/// Firmware version, formatted `a.b.c`.
pub type FwVersion = heapless::String<WL_FW_VER_LENGTH>;

/// Status reported by `connection_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WlStatus {
    Idle = 0,
    NoSsidAvail = 1,
    Connected = 3,
    ConnectFailed = 4,
    ConnectionLost = 5,
    Disconnected = 6,
    ApListening = 7,
    ApConnected = 8,
    ApFailed = 9,
    /// A station commit is in flight (scan, association or addressing).
    Connecting = 10,
}

impl WlStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(WlStatus::Idle),
            1 => Some(WlStatus::NoSsidAvail),
            3 => Some(WlStatus::Connected),
            4 => Some(WlStatus::ConnectFailed),
            5 => Some(WlStatus::ConnectionLost),
            6 => Some(WlStatus::Disconnected),
            7 => Some(WlStatus::ApListening),
            8 => Some(WlStatus::ApConnected),
            9 => Some(WlStatus::ApFailed),
            10 => Some(WlStatus::Connecting),
            _ => None,
        }
    }
}

impl fmt::Display for WlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WlStatus::Idle => "idle",
            WlStatus::NoSsidAvail => "no ssid available",
            WlStatus::Connected => "connected",
            WlStatus::ConnectFailed => "connect failed",
            WlStatus::ConnectionLost => "connection lost",
            WlStatus::Disconnected => "disconnected",
            WlStatus::ApListening => "ap listening",
            WlStatus::ApConnected => "ap connected",
            WlStatus::ApFailed => "ap failed",
            WlStatus::Connecting => "connecting",
        };
        f.write_str(name)
    }
}

/// Coarse encryption type, as returned by `enc_type_networks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EncType {
    /// WPA/WPA2 with TKIP only.
    Tkip = 2,
    /// WPA/WPA2/WPA3 with AES.
    Ccmp = 4,
    Wep = 5,
    None = 7,
    Auto = 8,
    Unknown = 255,
}

impl fmt::Display for EncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncType::Tkip => "WPA/TKIP",
            EncType::Ccmp => "WPA2/CCMP",
            EncType::Wep => "WEP",
            EncType::None => "open",
            EncType::Auto => "auto",
            EncType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Vendor security bitset: authentication flags and cipher flags in one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Security(pub u32);

impl Security {
    pub const WEP_ENABLED: u32 = 0x0000_0001;
    pub const TKIP_ENABLED: u32 = 0x0000_0002;
    pub const AES_ENABLED: u32 = 0x0000_0004;
    pub const SHARED_ENABLED: u32 = 0x0000_8000;
    pub const WPA_SECURITY: u32 = 0x0020_0000;
    pub const WPA2_SECURITY: u32 = 0x0040_0000;
    pub const WPA3_SECURITY: u32 = 0x0080_0000;
    pub const ENTERPRISE_ENABLED: u32 = 0x0200_0000;
    pub const WPS_ENABLED: u32 = 0x1000_0000;

    pub const OPEN: Security = Security(0);
    pub const WEP_PSK: Security = Security(Self::WEP_ENABLED);
    pub const WEP_SHARED: Security = Security(Self::WEP_ENABLED | Self::SHARED_ENABLED);
    pub const WPA_TKIP_PSK: Security = Security(Self::WPA_SECURITY | Self::TKIP_ENABLED);
    pub const WPA_AES_PSK: Security = Security(Self::WPA_SECURITY | Self::AES_ENABLED);
    pub const WPA2_AES_PSK: Security = Security(Self::WPA2_SECURITY | Self::AES_ENABLED);
    pub const WPA2_TKIP_PSK: Security = Security(Self::WPA2_SECURITY | Self::TKIP_ENABLED);
    pub const WPA2_MIXED_PSK: Security =
        Security(Self::WPA2_SECURITY | Self::AES_ENABLED | Self::TKIP_ENABLED);
    pub const WPA_WPA2_MIXED: Security = Security(
        Self::WPA_SECURITY | Self::WPA2_SECURITY | Self::AES_ENABLED | Self::TKIP_ENABLED,
    );
    pub const WPA3_AES_PSK: Security = Security(Self::WPA3_SECURITY | Self::AES_ENABLED);
    pub const WPA2_WPA3_MIXED: Security =
        Security(Self::WPA2_SECURITY | Self::WPA3_SECURITY | Self::AES_ENABLED);
    pub const WPS_OPEN: Security = Security(Self::WPS_ENABLED);
    pub const UNKNOWN: Security = Security(u32::MAX);

    const CIPHER_OR_AUTH: u32 = Self::WEP_ENABLED
        | Self::TKIP_ENABLED
        | Self::AES_ENABLED
        | Self::WPA_SECURITY
        | Self::WPA2_SECURITY
        | Self::WPA3_SECURITY
        | Self::ENTERPRISE_ENABLED;
    const ANY_WPA: u32 = Self::WPA_SECURITY | Self::WPA2_SECURITY | Self::WPA3_SECURITY;

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, flags: u32) -> bool {
        self.0 & flags == flags
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    pub fn is_open(self) -> bool {
        !self.is_unknown() && self.0 & Self::CIPHER_OR_AUTH == 0
    }

    pub fn is_wep(self) -> bool {
        !self.is_unknown() && self.contains(Self::WEP_ENABLED) && self.0 & Self::ANY_WPA == 0
    }

    /// WPA, WPA2 or WPA3 personal (pre-shared key).
    pub fn is_psk(self) -> bool {
        !self.is_unknown()
            && self.0 & Self::ANY_WPA != 0
            && !self.contains(Self::ENTERPRISE_ENABLED)
    }

    /// Collapse the bitset into the coarse [`EncType`] enumeration.
    pub fn enc_type(self) -> EncType {
        if self.is_open() {
            EncType::None
        } else if self.is_wep() {
            EncType::Wep
        } else if self.is_psk() && self.contains(Self::AES_ENABLED) {
            EncType::Ccmp
        } else if self.is_psk() && self.contains(Self::TKIP_ENABLED) {
            EncType::Tkip
        } else {
            EncType::Auto
        }
    }
}

impl Default for Security {
    fn default() -> Self {
        Security::OPEN
    }
}

/// IPv6 configuration state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Ipv6Status {
    #[default]
    None = 0,
    LinkLocal = 1,
    GlobalTentative = 2,
    GlobalValid = 3,
}

/// Network name: up to [`WL_SSID_MAX_LENGTH`] octets, not necessarily UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Ssid(heapless::Vec<u8, WL_SSID_MAX_LENGTH>);

impl Ssid {
    /// Returns `None` when `bytes` is longer than 32 octets.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        heapless::Vec::from_slice(bytes).ok().map(Ssid)
    }

    /// Keeps at most the first 32 octets of `bytes`.
    pub fn truncated(bytes: &[u8]) -> Self {
        let len = bytes.len().min(WL_SSID_MAX_LENGTH);
        Self::from_bytes(&bytes[..len]).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl PartialEq<str> for Ssid {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Ssid {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
