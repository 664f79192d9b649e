//! Scans, read-only queries and name resolution.
//!
//! Queries never block and never fail: values the radio cannot provide yet
//! (BSSID before association, say) come back zero-filled or empty, and the
//! caller may simply poll again.

use std::net::{Ipv4Addr, Ipv6Addr};

use log::{debug, info, warn};

use crate::connection::{WifiDrv, poll_until};
use crate::definitions::{
    EncType, FwVersion, Ipv6Status, MacAddress, Security, Ssid, WL_MAC_ADDR_LENGTH,
};
use crate::error::{Result, WifiError};
use crate::interface::Interface;
use crate::radio::Radio;
use crate::scan::ScanEntry;
use crate::stack::{DnsSlot, IpStack};

impl<R: Radio, S: IpStack> WifiDrv<R, S> {
    /// Run a scan and publish its results, returning the number of networks.
    ///
    /// The previous results are dropped as soon as the scan starts; on failure
    /// the table stays empty.
    pub fn start_scan_networks(&mut self) -> Result<u8> {
        // Step 1: Drop the old table and open a new numbered one
        self.scans.clear();
        let staging = self.events.scan();
        let scan = staging.begin();
        debug!("starting scan {scan}");
        self.radio
            .start_scan(scan)
            .inspect_err(|e| warn!("radio refused scan: {e}"))?;

        // Step 2: Wait for the driver to report completion of this scan
        let done = poll_until(
            self.settings.scan_timeout(),
            self.settings.poll_interval(),
            || staging.is_complete().then_some(()),
        );
        if done.is_none() {
            warn!("scan did not complete in time");
            return Err(WifiError::Timeout("scan"));
        }

        // Step 3: Publish the whole table at once
        self.scans.publish(staging.take());
        info!("scan found {} networks", self.scans.count());
        Ok(self.scans.count())
    }

    /// Network count of the last completed scan.
    pub fn scan_networks(&self) -> u8 {
        self.scans.count()
    }

    pub fn scan_results(&self) -> &[ScanEntry] {
        self.scans.entries()
    }

    pub fn ssid_networks(&self, network_item: u8) -> Ssid {
        self.scans.ssid(network_item)
    }

    pub fn rssi_networks(&self, network_item: u8) -> i32 {
        self.scans.rssi(network_item)
    }

    pub fn enc_type_networks(&self, network_item: u8) -> EncType {
        self.scans.enc_type(network_item)
    }

    /// Full security and cipher bitset of a scanned network.
    pub fn enc_type_networks_ex(&self, network_item: u8) -> Security {
        self.scans.enc_type_ex(network_item)
    }

    pub fn bssid_networks(&self, network_item: u8) -> Option<MacAddress> {
        self.scans.bssid(network_item)
    }

    pub fn mac_address(&self) -> MacAddress {
        self.radio.mac_address().unwrap_or_else(|e| {
            debug!("mac address unavailable: {e}");
            [0; WL_MAC_ADDR_LENGTH]
        })
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.stack.ipv4(Interface::Station).address
    }

    pub fn subnet_mask(&self) -> Ipv4Addr {
        self.stack.ipv4(Interface::Station).netmask
    }

    pub fn gateway_ip(&self) -> Ipv4Addr {
        self.stack.ipv4(Interface::Station).gateway
    }

    /// Unspecified (`::`) until the stack has configured an address.
    pub fn ipv6_address(&self) -> Ipv6Addr {
        self.stack
            .ipv6(Interface::Station)
            .address
            .unwrap_or(Ipv6Addr::UNSPECIFIED)
    }

    #[deprecated(note = "use `ipv6_address`, which returns the address")]
    pub fn log_ipv6_address(&self) {
        info!("ipv6 address: {}", self.ipv6_address());
    }

    pub fn ipv6_status(&self) -> Ipv6Status {
        self.stack.ipv6(Interface::Station).status
    }

    pub fn dns_server(&self, slot: DnsSlot) -> Ipv4Addr {
        self.stack.dns_server(slot)
    }

    /// Empty while not associated.
    pub fn current_ssid(&self) -> Ssid {
        self.radio.current_ssid().unwrap_or_default()
    }

    /// Zero-filled while not associated.
    pub fn current_bssid(&self) -> MacAddress {
        self.radio
            .bssid()
            .unwrap_or([0; WL_MAC_ADDR_LENGTH])
    }

    /// dBm; 0 while not associated.
    pub fn current_rssi(&self) -> i32 {
        self.radio.rssi().unwrap_or(0)
    }

    pub fn current_encryption_type(&self) -> EncType {
        self.radio
            .current_security()
            .map_or(EncType::Unknown, Security::enc_type)
    }

    /// `a.b.c`, empty if the radio cannot report it.
    pub fn fw_version(&self) -> FwVersion {
        self.radio.firmware_version().unwrap_or_else(|e| {
            debug!("firmware version unavailable: {e}");
            FwVersion::new()
        })
    }

    pub fn disable_power_save(&mut self) -> Result<()> {
        self.radio.set_power_save(false)?;
        info!("power save disabled");
        Ok(())
    }

    /// Resolve an A record. Dotted-quad literals are returned without a query.
    ///
    /// Fails with [`WifiError::HostNotFound`] (code 0) for an unknown name and
    /// [`WifiError::Dns`] (negative code) when the lookup itself failed.
    pub fn host_by_name(&mut self, hostname: &str) -> Result<Ipv4Addr> {
        if let Ok(literal) = hostname.parse::<Ipv4Addr>() {
            return Ok(literal);
        }
        match self.stack.resolve_ipv4(hostname) {
            Ok(Some(address)) => Ok(address),
            Ok(None) => {
                debug!("{hostname} not found");
                Err(WifiError::HostNotFound(hostname.to_string()))
            }
            Err(e) => {
                warn!("dns lookup for {hostname} failed: {e}");
                Err(WifiError::Dns(e))
            }
        }
    }

    /// Resolve an AAAA record, same contract as [`Self::host_by_name`].
    pub fn host_by_name_v6(&mut self, hostname: &str) -> Result<Ipv6Addr> {
        if let Ok(literal) = hostname.parse::<Ipv6Addr>() {
            return Ok(literal);
        }
        match self.stack.resolve_ipv6(hostname) {
            Ok(Some(address)) => Ok(address),
            Ok(None) => {
                debug!("{hostname} has no AAAA record");
                Err(WifiError::HostNotFound(hostname.to_string()))
            }
            Err(e) => {
                warn!("dns lookup for {hostname} failed: {e}");
                Err(WifiError::Dns(e))
            }
        }
    }
}
