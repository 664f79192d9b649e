//! Radio collaborator contract.
//!
//! The radio driver (PHY/MAC, supplicant, soft-AP firmware) is external. The
//! controller talks to it through [`Radio`]; the driver talks back through the
//! [`DriverEvents`] handle it receives in [`Radio::init`]. Scan results and
//! link changes may be delivered from the driver's own task at any time.
//!
//! Both long-running operations are numbered. [`Radio::start_scan`] receives a
//! [`ScanId`] and [`Radio::connect`] a [`ConnectRequest`] carrying an
//! [`AttemptId`]; the driver quotes the number back with every report, which
//! lets the controller ignore reports for operations it has given up on.

use std::fmt;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::definitions::{
    FwVersion, MacAddress, Security, Ssid, WL_WEP_104_KEY_LENGTH, WL_WPA_KEY_MAX_LENGTH, WlStatus,
};
use crate::error::RadioError;
use crate::interface::{Association, AttemptId, LinkState};
use crate::scan::{ScanControl, ScanEntry, ScanId, ScanStaging};

pub type Passphrase = heapless::String<WL_WPA_KEY_MAX_LENGTH>;
pub type WepKey = heapless::Vec<u8, WL_WEP_104_KEY_LENGTH>;

/// Credential presented at association. Exactly one kind governs a connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Open,
    Passphrase(Passphrase),
    Wep { index: u8, key: WepKey },
}

impl Credential {
    /// Security type requested from the driver. For a passphrase the driver
    /// negotiates the strongest cipher both ends support.
    pub fn security(&self) -> Security {
        match self {
            Credential::Open => Security::OPEN,
            Credential::Passphrase(_) => Security::WPA2_AES_PSK,
            Credential::Wep { .. } => Security::WEP_PSK,
        }
    }

    /// WEP key slot, 0 for every other credential.
    pub fn key_index(&self) -> u8 {
        match self {
            Credential::Wep { index, .. } => *index,
            _ => 0,
        }
    }
}

/// One association attempt as handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Number to quote when reporting the outcome.
    pub attempt: AttemptId,
    pub ssid: Ssid,
    pub credential: Credential,
}

impl ConnectRequest {
    pub fn security(&self) -> Security {
        self.credential.security()
    }
}

/// Soft-AP start parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApParams {
    pub ssid: Ssid,
    /// `None` starts an open AP.
    pub passphrase: Option<Passphrase>,
    pub channel: u8,
    pub hidden: bool,
}

struct Shared {
    link: LinkState,
    scan: ScanStaging,
}

/// Callback handle handed to the driver. Cheap to clone, safe to use from the
/// driver task.
#[derive(Clone)]
pub struct DriverEvents {
    shared: Arc<Shared>,
}

impl DriverEvents {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                link: LinkState::new(),
                scan: ScanStaging::new(),
            }),
        }
    }

    pub(crate) fn link(&self) -> &LinkState {
        &self.shared.link
    }

    pub(crate) fn scan(&self) -> &ScanStaging {
        &self.shared.scan
    }

    /// Per-BSS scan result handler.
    ///
    /// # Arguments
    /// * `scan` - Id passed to [`Radio::start_scan`]
    /// * `entry` - The BSS just seen
    ///
    /// # Returns
    /// Whether the driver should keep reporting. A stale `scan` gets
    /// [`ScanControl::Stop`].
    pub fn scan_result(&self, scan: ScanId, entry: ScanEntry) -> ScanControl {
        self.shared.scan.push(scan, entry)
    }

    /// Scan `scan` has reported its last BSS.
    pub fn scan_complete(&self, scan: ScanId) {
        self.shared.scan.complete(scan);
    }

    /// Attempt `attempt` joined its network.
    pub fn associated(&self, attempt: AttemptId) {
        self.shared
            .link
            .report_association(attempt, Association::Associated);
    }

    /// Attempt `attempt` was rejected (bad credential, auth timeout).
    pub fn association_failed(&self, attempt: AttemptId) {
        self.shared
            .link
            .report_association(attempt, Association::Failed);
    }

    /// The target SSID was not found after a full scan.
    pub fn no_network(&self, attempt: AttemptId) {
        self.shared
            .link
            .report_association(attempt, Association::NoNetwork);
    }

    /// An established station link went down.
    pub fn link_lost(&self) {
        self.shared.link.report_link_lost();
    }

    /// A station associated with the soft AP.
    pub fn ap_client_joined(&self) {
        self.shared.link.ap_client_joined();
    }

    pub fn ap_client_left(&self) {
        self.shared.link.ap_client_left();
    }

    /// Station status as currently published by the controller.
    pub fn station_status(&self) -> WlStatus {
        self.shared.link.station_status()
    }
}

impl fmt::Debug for DriverEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverEvents")
            .field("station", &self.shared.link.station_status())
            .field("attempt", &self.shared.link.attempt())
            .field("association", &self.shared.link.association())
            .field("ap_clients", &self.shared.link.ap_clients())
            .finish()
    }
}

/// Vendor WiFi driver.
///
/// `start_scan` and `connect` only start the operation; completion is
/// reported through [`DriverEvents`].
#[cfg_attr(test, automock)]
pub trait Radio {
    /// Bring the driver up and register the callback handle.
    ///
    /// # Arguments
    /// * `events` - Handle the driver reports through, from any task
    fn init(&mut self, events: DriverEvents) -> Result<(), RadioError>;

    /// Start a scan of all channels.
    ///
    /// # Arguments
    /// * `scan` - Id to quote in [`DriverEvents::scan_result`] and
    ///   [`DriverEvents::scan_complete`]
    ///
    /// # Returns
    /// As soon as the scan is running. Results arrive through the callbacks.
    fn start_scan(&mut self, scan: ScanId) -> Result<(), RadioError>;

    /// Start associating with `request.ssid`.
    ///
    /// # Returns
    /// As soon as the attempt is under way. The outcome is reported through
    /// [`DriverEvents::associated`], [`DriverEvents::association_failed`] or
    /// [`DriverEvents::no_network`] quoting `request.attempt`.
    fn connect(&mut self, request: &ConnectRequest) -> Result<(), RadioError>;

    /// Leave the current network, or abort an attempt in flight.
    fn disconnect(&mut self) -> Result<(), RadioError>;

    /// Whether station and soft AP can run at the same time.
    fn supports_concurrent_mode(&self) -> bool;

    /// Start the soft AP. Blocks until the AP is beaconing.
    fn start_ap(&mut self, params: &ApParams) -> Result<(), RadioError>;

    fn stop_ap(&mut self) -> Result<(), RadioError>;

    /// MAC address of the station interface.
    fn mac_address(&self) -> Result<MacAddress, RadioError>;

    /// BSSID of the associated AP.
    fn bssid(&self) -> Result<MacAddress, RadioError>;

    /// Signal strength of the current link in dBm.
    fn rssi(&self) -> Result<i32, RadioError>;

    fn current_ssid(&self) -> Result<Ssid, RadioError>;

    fn current_security(&self) -> Result<Security, RadioError>;

    fn set_power_save(&mut self, enabled: bool) -> Result<(), RadioError>;

    fn firmware_version(&self) -> Result<FwVersion, RadioError>;
}
