//! In-process radio and IP stack for benches and tests.
//!
//! [`bench`] builds a [`SimRadio`] and a [`SimStack`] over one shared
//! [`SimEnvironment`], plus a [`SimControl`] that can inspect what the
//! controller asked for and inject driver-side events (link loss, AP clients).
//! With `latency_ms > 0` the radio answers scans and associations from a
//! separate thread, the way a real driver task would.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::definitions::{FwVersion, Ipv6Status, MacAddress, Security, Ssid, WlStatus};
use crate::error::{RadioError, StackError};
use crate::interface::Interface;
use crate::radio::{ApParams, ConnectRequest, Credential, DriverEvents, Radio};
use crate::scan::{ScanControl, ScanEntry, ScanId};
use crate::stack::{DnsSlot, IpStack, Ipv4Settings, Ipv6Settings};

/// Code returned by the simulated resolver when DNS is unreachable.
pub const SIM_DNS_TRANSPORT_ERROR: i32 = -4;

/// A BSS visible to the simulated radio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimNetwork {
    pub ssid: String,
    pub bssid: MacAddress,
    pub rssi: i32,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub wep_key: Option<Vec<u8>>,
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Never answers association requests.
    #[serde(default)]
    pub silent: bool,
}

fn default_channel() -> u8 {
    6
}

impl SimNetwork {
    pub fn open(ssid: &str, last_octet: u8, rssi: i32) -> Self {
        Self {
            ssid: ssid.to_string(),
            bssid: [0x02, 0x00, 0x00, 0x00, 0x00, last_octet],
            rssi,
            security: Security::OPEN,
            passphrase: None,
            wep_key: None,
            channel: default_channel(),
            silent: false,
        }
    }

    pub fn wpa2(ssid: &str, last_octet: u8, rssi: i32, passphrase: &str) -> Self {
        Self {
            security: Security::WPA2_AES_PSK,
            passphrase: Some(passphrase.to_string()),
            ..Self::open(ssid, last_octet, rssi)
        }
    }

    pub fn wep(ssid: &str, last_octet: u8, rssi: i32, key: &[u8]) -> Self {
        Self {
            security: Security::WEP_PSK,
            wep_key: Some(key.to_vec()),
            ..Self::open(ssid, last_octet, rssi)
        }
    }

    fn accepts(&self, credential: &Credential) -> bool {
        match credential {
            Credential::Open => self.security.is_open(),
            Credential::Passphrase(passphrase) => {
                self.security.is_psk() && self.passphrase.as_deref() == Some(passphrase.as_str())
            }
            Credential::Wep { key, .. } => {
                self.security.is_wep() && self.wep_key.as_deref() == Some(key.as_slice())
            }
        }
    }

    fn scan_entry(&self) -> ScanEntry {
        ScanEntry {
            ssid: Ssid::truncated(self.ssid.as_bytes()),
            rssi: self.rssi,
            security: self.security,
            bssid: Some(self.bssid),
            channel: self.channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimHost {
    pub name: String,
    #[serde(default)]
    pub ipv4: Option<Ipv4Addr>,
    #[serde(default)]
    pub ipv6: Option<Ipv6Addr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimEnvironment {
    pub firmware: String,
    pub mac: MacAddress,
    pub concurrent_mode: bool,
    pub latency_ms: u64,
    pub lease_address: Ipv4Addr,
    pub lease_netmask: Ipv4Addr,
    pub lease_gateway: Ipv4Addr,
    pub lease_dns: Ipv4Addr,
    pub global_ipv6: Option<Ipv6Addr>,
    pub dhcp_fails: bool,
    pub ap_start_fails: bool,
    pub dns_unreachable: bool,
    pub networks: Vec<SimNetwork>,
    pub hosts: Vec<SimHost>,
}

impl Default for SimEnvironment {
    fn default() -> Self {
        Self {
            firmware: "1.0.0".to_string(),
            mac: [0x00, 0xe0, 0x4c, 0x87, 0x00, 0x01],
            concurrent_mode: true,
            latency_ms: 0,
            lease_address: Ipv4Addr::new(192, 168, 1, 100),
            lease_netmask: Ipv4Addr::new(255, 255, 255, 0),
            lease_gateway: Ipv4Addr::new(192, 168, 1, 1),
            lease_dns: Ipv4Addr::new(192, 168, 1, 1),
            global_ipv6: None,
            dhcp_fails: false,
            ap_start_fails: false,
            dns_unreachable: false,
            networks: vec![
                SimNetwork::wpa2("alpha", 0x01, -50, "correcthorse"),
                SimNetwork::open("beta", 0x02, -70),
            ],
            hosts: vec![SimHost {
                name: "example.com".to_string(),
                ipv4: Some(Ipv4Addr::new(93, 184, 216, 34)),
                ipv6: "2606:2800:220:1:248:1893:25c8:1946".parse().ok(),
            }],
        }
    }
}

/// Something the controller asked a collaborator to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Scan,
    Connect {
        ssid: String,
        security: Security,
        key_index: u8,
        /// Station status published when the radio was called.
        status: WlStatus,
    },
    Disconnect,
    StartAp(ApParams),
    StopAp,
    PowerSave(bool),
    Hostname {
        iface: Interface,
        hostname: String,
    },
    Dhcp {
        iface: Interface,
        enabled: bool,
    },
    Lease {
        iface: Interface,
        hostname: String,
    },
    StaticIpv4 {
        iface: Interface,
        address: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
        netmask: Option<Ipv4Addr>,
    },
    DhcpServer {
        iface: Interface,
        enabled: bool,
    },
    Dns {
        slot: DnsSlot,
        server: Ipv4Addr,
    },
}

struct SimState {
    env: SimEnvironment,
    driver: Option<DriverEvents>,
    log: Vec<SimEvent>,
    associated: Option<SimNetwork>,
    ap: Option<ApParams>,
    hostnames: [String; 2],
    dhcp: [bool; 2],
    ipv4: [Ipv4Settings; 2],
    ipv6: [Ipv6Settings; 2],
    dns: [Ipv4Addr; 2],
}

impl SimState {
    fn new(env: SimEnvironment) -> Self {
        // Stack defaults kept by a static configuration that omits them.
        let defaults = Ipv4Settings {
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            ..Ipv4Settings::UNSPECIFIED
        };
        Self {
            env,
            driver: None,
            log: Vec::new(),
            associated: None,
            ap: None,
            hostnames: Default::default(),
            dhcp: [false; 2],
            ipv4: [defaults; 2],
            ipv6: Default::default(),
            dns: [Ipv4Addr::UNSPECIFIED; 2],
        }
    }

    fn link_local(&self) -> Ipv6Addr {
        let m = self.env.mac;
        Ipv6Addr::new(
            0xfe80,
            0,
            0,
            0,
            u16::from_be_bytes([m[0] ^ 0x02, m[1]]),
            u16::from_be_bytes([m[2], 0xff]),
            u16::from_be_bytes([0xfe, m[3]]),
            u16::from_be_bytes([m[4], m[5]]),
        )
    }

    fn address_ipv6(&mut self, iface: Interface) {
        let settings = match self.env.global_ipv6 {
            Some(global) => Ipv6Settings {
                address: Some(global),
                status: Ipv6Status::GlobalValid,
            },
            None => Ipv6Settings {
                address: Some(self.link_local()),
                status: Ipv6Status::LinkLocal,
            },
        };
        self.ipv6[usize::from(iface.index())] = settings;
    }
}

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `report` inline, or after `latency` on a separate thread.
fn deliver(
    latency: Duration,
    events: DriverEvents,
    report: impl FnOnce(&DriverEvents) + Send + 'static,
) {
    if latency.is_zero() {
        report(&events);
    } else {
        thread::spawn(move || {
            thread::sleep(latency);
            report(&events);
        });
    }
}

pub struct SimRadio {
    state: Shared,
}

pub struct SimStack {
    state: Shared,
}

/// Test-side handle onto the simulated environment.
#[derive(Clone)]
pub struct SimControl {
    state: Shared,
}

pub fn bench(env: SimEnvironment) -> (SimRadio, SimStack, SimControl) {
    let state = Arc::new(Mutex::new(SimState::new(env)));
    (
        SimRadio {
            state: state.clone(),
        },
        SimStack {
            state: state.clone(),
        },
        SimControl { state },
    )
}

impl SimControl {
    /// Everything the collaborators were asked to do, in order.
    pub fn log(&self) -> Vec<SimEvent> {
        lock(&self.state).log.clone()
    }

    pub fn clear_log(&self) {
        lock(&self.state).log.clear();
    }

    /// Change the environment between calls, e.g. to alter what the next
    /// scan sees.
    pub fn update(&self, change: impl FnOnce(&mut SimEnvironment)) {
        change(&mut lock(&self.state).env);
    }

    pub fn associated_ssid(&self) -> Option<String> {
        lock(&self.state).associated.as_ref().map(|n| n.ssid.clone())
    }

    pub fn ap(&self) -> Option<ApParams> {
        lock(&self.state).ap.clone()
    }

    /// The AP drops the station.
    pub fn drop_link(&self) {
        let driver = {
            let mut state = lock(&self.state);
            state.associated = None;
            state.driver.clone()
        };
        if let Some(events) = driver {
            events.link_lost();
        }
    }

    pub fn ap_client_joins(&self) {
        if let Some(events) = lock(&self.state).driver.clone() {
            events.ap_client_joined();
        }
    }

    pub fn ap_client_leaves(&self) {
        if let Some(events) = lock(&self.state).driver.clone() {
            events.ap_client_left();
        }
    }
}

impl SimRadio {
    fn driver(&self) -> Result<(DriverEvents, Duration), RadioError> {
        let state = lock(&self.state);
        let events = state.driver.clone().ok_or(RadioError::NotInitialized)?;
        Ok((events, Duration::from_millis(state.env.latency_ms)))
    }

    fn associated<T>(&self, read: impl FnOnce(&SimNetwork) -> T) -> Result<T, RadioError> {
        lock(&self.state)
            .associated
            .as_ref()
            .map(read)
            .ok_or(RadioError::NotAssociated)
    }
}

impl Radio for SimRadio {
    fn init(&mut self, events: DriverEvents) -> Result<(), RadioError> {
        lock(&self.state).driver = Some(events);
        Ok(())
    }

    fn start_scan(&mut self, scan: ScanId) -> Result<(), RadioError> {
        let (events, latency) = self.driver()?;
        let entries: Vec<ScanEntry> = {
            let mut state = lock(&self.state);
            state.log.push(SimEvent::Scan);
            state.env.networks.iter().map(SimNetwork::scan_entry).collect()
        };
        deliver(latency, events, move |events| {
            for entry in entries {
                if events.scan_result(scan, entry) == ScanControl::Stop {
                    break;
                }
            }
            events.scan_complete(scan);
        });
        Ok(())
    }

    fn connect(&mut self, request: &ConnectRequest) -> Result<(), RadioError> {
        let (events, latency) = self.driver()?;
        let target = {
            let mut state = lock(&self.state);
            state.log.push(SimEvent::Connect {
                ssid: request.ssid.to_string(),
                security: request.security(),
                key_index: request.credential.key_index(),
                status: events.station_status(),
            });
            let target = state
                .env
                .networks
                .iter()
                .find(|n| request.ssid == n.ssid.as_str())
                .cloned();
            if let Some(network) = &target {
                if !network.silent && network.accepts(&request.credential) {
                    state.associated = Some(network.clone());
                }
            }
            target
        };

        let attempt = request.attempt;
        match target {
            None => deliver(latency, events, move |events| events.no_network(attempt)),
            Some(network) if network.silent => {}
            Some(network) if network.accepts(&request.credential) => {
                deliver(latency, events, move |events| events.associated(attempt))
            }
            Some(_) => deliver(latency, events, move |events| {
                events.association_failed(attempt)
            }),
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.associated = None;
        state.log.push(SimEvent::Disconnect);
        Ok(())
    }

    fn supports_concurrent_mode(&self) -> bool {
        lock(&self.state).env.concurrent_mode
    }

    fn start_ap(&mut self, params: &ApParams) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        if state.env.ap_start_fails {
            return Err(RadioError::Driver(-1));
        }
        state.log.push(SimEvent::StartAp(params.clone()));
        state.ap = Some(params.clone());
        Ok(())
    }

    fn stop_ap(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.ap = None;
        state.log.push(SimEvent::StopAp);
        Ok(())
    }

    fn mac_address(&self) -> Result<MacAddress, RadioError> {
        Ok(lock(&self.state).env.mac)
    }

    fn bssid(&self) -> Result<MacAddress, RadioError> {
        self.associated(|n| n.bssid)
    }

    fn rssi(&self) -> Result<i32, RadioError> {
        self.associated(|n| n.rssi)
    }

    fn current_ssid(&self) -> Result<Ssid, RadioError> {
        self.associated(|n| Ssid::truncated(n.ssid.as_bytes()))
    }

    fn current_security(&self) -> Result<Security, RadioError> {
        self.associated(|n| n.security)
    }

    fn set_power_save(&mut self, enabled: bool) -> Result<(), RadioError> {
        lock(&self.state).log.push(SimEvent::PowerSave(enabled));
        Ok(())
    }

    fn firmware_version(&self) -> Result<FwVersion, RadioError> {
        FwVersion::try_from(lock(&self.state).env.firmware.as_str()).map_err(|_| RadioError::Driver(-1))
    }
}

impl IpStack for SimStack {
    fn set_hostname(&mut self, iface: Interface, hostname: &str) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.hostnames[usize::from(iface.index())] = hostname.to_string();
        state.log.push(SimEvent::Hostname {
            iface,
            hostname: hostname.to_string(),
        });
        Ok(())
    }

    fn set_dhcp(&mut self, iface: Interface, enabled: bool) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        let i = usize::from(iface.index());
        state.dhcp[i] = enabled;
        if enabled {
            state.ipv4[i].address = Ipv4Addr::UNSPECIFIED;
        }
        state.log.push(SimEvent::Dhcp { iface, enabled });
        Ok(())
    }

    fn wait_for_lease(&mut self, iface: Interface, _timeout: Duration) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        let i = usize::from(iface.index());
        if !state.dhcp[i] {
            return Err(StackError::Driver(-1));
        }
        if state.env.dhcp_fails {
            return Err(StackError::LeaseTimeout);
        }
        state.ipv4[i] = Ipv4Settings {
            address: state.env.lease_address,
            netmask: state.env.lease_netmask,
            gateway: state.env.lease_gateway,
        };
        state.dns[DnsSlot::Primary.index()] = state.env.lease_dns;
        state.address_ipv6(iface);
        let hostname = state.hostnames[i].clone();
        state.log.push(SimEvent::Lease { iface, hostname });
        Ok(())
    }

    fn set_static_ipv4(
        &mut self,
        iface: Interface,
        address: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
        netmask: Option<Ipv4Addr>,
    ) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        let i = usize::from(iface.index());
        state.dhcp[i] = false;
        let current = &mut state.ipv4[i];
        current.address = address;
        if let Some(gateway) = gateway {
            current.gateway = gateway;
        }
        if let Some(netmask) = netmask {
            current.netmask = netmask;
        }
        state.address_ipv6(iface);
        state.log.push(SimEvent::StaticIpv4 {
            iface,
            address,
            gateway,
            netmask,
        });
        Ok(())
    }

    fn set_dhcp_server(&mut self, iface: Interface, enabled: bool) -> Result<(), StackError> {
        lock(&self.state)
            .log
            .push(SimEvent::DhcpServer { iface, enabled });
        Ok(())
    }

    fn ipv4(&self, iface: Interface) -> Ipv4Settings {
        lock(&self.state).ipv4[usize::from(iface.index())]
    }

    fn ipv6(&self, iface: Interface) -> Ipv6Settings {
        lock(&self.state).ipv6[usize::from(iface.index())]
    }

    fn set_dns_server(&mut self, slot: DnsSlot, server: Ipv4Addr) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.dns[slot.index()] = server;
        state.log.push(SimEvent::Dns { slot, server });
        Ok(())
    }

    fn dns_server(&self, slot: DnsSlot) -> Ipv4Addr {
        lock(&self.state).dns[slot.index()]
    }

    fn resolve_ipv4(&mut self, host: &str) -> Result<Option<Ipv4Addr>, StackError> {
        let state = lock(&self.state);
        if state.env.dns_unreachable {
            return Err(StackError::Transport(SIM_DNS_TRANSPORT_ERROR));
        }
        Ok(state
            .env
            .hosts
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(host))
            .and_then(|h| h.ipv4))
    }

    fn resolve_ipv6(&mut self, host: &str) -> Result<Option<Ipv6Addr>, StackError> {
        let state = lock(&self.state);
        if state.env.dns_unreachable {
            return Err(StackError::Transport(SIM_DNS_TRANSPORT_ERROR));
        }
        Ok(state
            .env
            .hosts
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(host))
            .and_then(|h| h.ipv6))
    }
}
