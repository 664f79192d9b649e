//! Station connection management.
//!
//! [`WifiDrv`] is the interface controller: it owns the staged configuration,
//! the published scan table and both collaborators, and it is the only place
//! the observable status changes on the application side. One instance is
//! meant to live for the whole application; commits take `&mut self`, so two
//! commits can never be in flight at once.
//!
//! A station commit runs these steps, stopping at the first failure:
//!
//! 1. Validate SSID and credential locally (status untouched on rejection)
//! 2. Publish `Connecting` and push the hostname to the IP stack
//! 3. Ask the radio to associate and wait up to the connect timeout
//! 4. Apply static IPv4 or run DHCP, then apply staged DNS servers
//! 5. Publish `Connected` and consume the staged IPv4/DNS intent
//!
//! # Example
//!
//! ```no_run
//! use ambd_wifi::{DriverConfig, WifiDrv, sim};
//!
//! let (radio, stack, _ctl) = sim::bench(sim::SimEnvironment::default());
//! let mut drv = WifiDrv::new(radio, stack, DriverConfig::default()).expect("driver init");
//! drv.set_hostname("sensor");
//! drv.wifi_set_passphrase("alpha", "correcthorse").expect("connect");
//! println!("ip: {}", drv.ip_address());
//! ```

use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::DriverConfig;
use crate::definitions::WlStatus;
use crate::error::{Result, WifiError};
use crate::definitions::Ssid;
use crate::interface::{Association, Interface};
use crate::radio::{ConnectRequest, Credential, DriverEvents, Radio};
use crate::scan::ScanCache;
use crate::stack::{DnsSlot, IpStack};
use crate::staging::{self, Staging};

/// Soft-AP lifecycle as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApState {
    Off,
    Up,
    Failed,
}

/// Interface whose sub-status `connection_status` reports: the one touched by
/// the most recent commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Station,
    AccessPoint,
}

/// WiFi interface controller for one radio and one IP stack.
///
/// Owns both collaborators. Status written by the driver task is read through
/// the shared [`DriverEvents`] handle; everything else is plain controller
/// state behind `&mut self`.
pub struct WifiDrv<R: Radio, S: IpStack> {
    /// Vendor driver, initialized in [`WifiDrv::new`]
    pub(crate) radio: R,
    /// IP stack for addressing, DHCP and name resolution
    pub(crate) stack: S,
    /// Timeouts and AP defaults
    pub(crate) settings: DriverConfig,
    /// Handle shared with the driver task (link status, scan staging)
    pub(crate) events: DriverEvents,
    /// Configuration recorded for the next commit
    pub(crate) staging: Staging,
    /// Results of the last completed scan
    pub(crate) scans: ScanCache,
    /// Soft-AP lifecycle
    pub(crate) ap: ApState,
    /// Interface `connection_status` reports on
    pub(crate) focus: Focus,
}

impl<R: Radio, S: IpStack> WifiDrv<R, S> {
    /// Initializes the radio driver and hands it the event handle.
    pub fn new(mut radio: R, stack: S, settings: DriverConfig) -> Result<Self> {
        let events = DriverEvents::new();
        radio.init(events.clone()).inspect_err(|e| warn!("radio init failed: {e}"))?;

        let mut staging = Staging::new();
        if let Some(hostname) = &settings.hostname {
            staging.set_hostname(hostname);
        }

        info!("wifi driver initialized");
        Ok(Self {
            radio,
            stack,
            settings,
            events,
            staging,
            scans: ScanCache::new(),
            ap: ApState::Off,
            focus: Focus::Station,
        })
    }

    /// Settings the driver was created with.
    pub fn settings(&self) -> &DriverConfig {
        &self.settings
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Stage a static IPv4 configuration; `valid_params` (1..=3) selects how
    /// many of address, gateway and netmask apply. Zero is a no-op and does
    /// not re-enable DHCP.
    pub fn config(
        &mut self,
        valid_params: u8,
        local_ip: std::net::Ipv4Addr,
        gateway: std::net::Ipv4Addr,
        subnet: std::net::Ipv4Addr,
    ) -> Result<()> {
        self.staging
            .stage_static_ip(valid_params, local_ip, gateway, subnet)
    }

    /// Stage DNS servers; `valid_params` is 1 (primary) or 2 (both).
    pub fn set_dns(
        &mut self,
        valid_params: u8,
        dns_server1: std::net::Ipv4Addr,
        dns_server2: std::net::Ipv4Addr,
    ) -> Result<()> {
        self.staging
            .stage_dns(valid_params, dns_server1, dns_server2)
    }

    /// Record the hostname used for the next commit, truncated to 20 octets.
    pub fn set_hostname(&mut self, hostname: &str) {
        self.staging.set_hostname(hostname);
    }

    /// Hostname staged for the next commit, empty when unset.
    pub fn hostname(&self) -> &str {
        self.staging.hostname()
    }

    /// Join an open network.
    pub fn wifi_set_network(&mut self, ssid: &str) -> Result<()> {
        let ssid = staging::parse_ssid(ssid)?;
        self.connect(ssid, Credential::Open)
    }

    /// Join a WPA/WPA2 personal network.
    pub fn wifi_set_passphrase(&mut self, ssid: &str, passphrase: &str) -> Result<()> {
        let ssid = staging::parse_ssid(ssid)?;
        let passphrase = staging::parse_passphrase(passphrase)?;
        self.connect(ssid, Credential::Passphrase(passphrase))
    }

    /// Join a WEP network. The key length selects WEP-40 (5) or WEP-104 (13).
    pub fn wifi_set_key(&mut self, ssid: &str, key_idx: u8, key: &[u8]) -> Result<()> {
        let ssid = staging::parse_ssid(ssid)?;
        let credential = staging::parse_wep_key(key_idx, key)?;
        self.connect(ssid, credential)
    }

    /// Tear down the station association. Staged configuration is kept.
    /// Always succeeds and always leaves the station `Disconnected`.
    pub fn disconnect(&mut self) -> Result<()> {
        let link = self.events.link();
        if link.station_status() != WlStatus::Disconnected {
            if let Err(e) = self.radio.disconnect() {
                warn!("radio refused disconnect: {e}");
            }
            link.abandon_association();
            link.set_station_status(WlStatus::Disconnected);
            info!("station disconnected");
        }
        self.focus = Focus::Station;
        Ok(())
    }

    /// Combined status: the sub-status of the interface committed last.
    pub fn connection_status(&self) -> WlStatus {
        match self.focus {
            Focus::AccessPoint => self.ap_status().unwrap_or(WlStatus::Idle),
            Focus::Station => self.station_status(),
        }
    }

    /// Station sub-status as last published.
    pub fn station_status(&self) -> WlStatus {
        self.events.link().station_status()
    }

    /// `None` while the soft AP is off.
    pub fn ap_status(&self) -> Option<WlStatus> {
        match self.ap {
            ApState::Off => None,
            ApState::Failed => Some(WlStatus::ApFailed),
            ApState::Up if self.events.link().ap_clients() > 0 => Some(WlStatus::ApConnected),
            ApState::Up => Some(WlStatus::ApListening),
        }
    }

    /// Station commit for an already validated SSID and credential.
    fn connect(&mut self, ssid: Ssid, credential: Credential) -> Result<()> {
        // Step 1: Claim the radio for the station and number the attempt
        self.focus = Focus::Station;
        self.make_room_for_station();
        let attempt = self.events.link().begin_association();
        let request = ConnectRequest {
            attempt,
            ssid,
            credential,
        };
        let ssid = request.ssid.to_string();
        info!("connecting to '{ssid}' (attempt {attempt})");

        // Step 2: Hostname must reach the stack before DHCP runs
        let hostname = self.staging.hostname();
        if !hostname.is_empty() {
            if let Err(e) = self.stack.set_hostname(Interface::Station, hostname) {
                return Err(self.fail(WlStatus::ConnectFailed, e.into()));
            }
        }

        // Step 3: Associate
        if let Err(e) = self.radio.connect(&request) {
            return Err(self.fail(WlStatus::ConnectFailed, e.into()));
        }

        let link = self.events.link();
        let outcome = poll_until(
            self.settings.connect_timeout(),
            self.settings.poll_interval(),
            || match link.association() {
                Association::Pending => None,
                done => Some(done),
            },
        );
        match outcome {
            Some(Association::Associated) => {}
            Some(Association::NoNetwork) => {
                return Err(self.fail(WlStatus::NoSsidAvail, WifiError::NoSsidAvail(ssid)));
            }
            Some(_) => {
                return Err(self.fail(
                    WlStatus::ConnectFailed,
                    WifiError::AssociationFailed(ssid),
                ));
            }
            None => {
                self.events.link().abandon_association();
                if let Err(e) = self.radio.disconnect() {
                    warn!("radio refused to abort association: {e}");
                }
                return Err(self.fail(WlStatus::ConnectFailed, WifiError::Timeout("association")));
            }
        }

        // Step 4: Addressing, then DNS
        if let Err(e) = self.configure_station_ip() {
            self.events.link().abandon_association();
            if let Err(e) = self.radio.disconnect() {
                warn!("radio refused disconnect: {e}");
            }
            return Err(self.fail(WlStatus::ConnectFailed, e));
        }

        if self.events.link().association() != Association::Associated {
            return Err(self.fail(
                WlStatus::ConnectFailed,
                WifiError::AssociationFailed(ssid),
            ));
        }

        // Step 5: Publish and consume the one-shot IPv4/DNS intent
        self.staging.consume_ip_config();
        self.events.link().set_station_status(WlStatus::Connected);
        info!("connected to '{ssid}'");
        Ok(())
    }

    /// A radio without concurrent mode cannot keep the soft AP up while it
    /// joins a network.
    fn make_room_for_station(&mut self) {
        match self.ap {
            ApState::Up if !self.radio.supports_concurrent_mode() => {
                if let Err(e) = self.ap_deactivate() {
                    warn!("could not stop soft AP before connecting: {e}");
                    self.ap = ApState::Off;
                }
                self.focus = Focus::Station;
            }
            ApState::Failed => self.ap = ApState::Off,
            _ => {}
        }
    }

    fn configure_station_ip(&mut self) -> Result<()> {
        match self.staging.static_ip() {
            Some(ip) => {
                self.stack.set_dhcp(Interface::Station, false)?;
                self.stack
                    .set_static_ipv4(Interface::Station, ip.address, ip.gateway, ip.netmask)?;
                info!("static address {} ({} params)", ip.address, ip.valid_params());
            }
            None => {
                self.stack.set_dhcp(Interface::Station, true)?;
                self.stack
                    .wait_for_lease(Interface::Station, self.settings.dhcp_timeout())?;
                info!(
                    "dhcp lease {}",
                    self.stack.ipv4(Interface::Station).address
                );
            }
        }

        if let Some(dns) = self.staging.dns() {
            self.stack.set_dns_server(DnsSlot::Primary, dns.primary)?;
            if let Some(secondary) = dns.secondary {
                self.stack.set_dns_server(DnsSlot::Secondary, secondary)?;
            }
        }
        Ok(())
    }

    fn fail(&self, status: WlStatus, error: WifiError) -> WifiError {
        warn!("station commit failed ({status}): {error}");
        self.events.link().set_station_status(status);
        error
    }
}

/// Re-evaluate `check` every `interval` until it yields a value or `timeout`
/// elapses.
pub(crate) fn poll_until<T>(
    timeout: Duration,
    interval: Duration,
    mut check: impl FnMut() -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};

    use mockall::Sequence;
    use mockall::predicate::eq;

    use super::*;
    use crate::error::RadioError;
    use crate::radio::MockRadio;
    use crate::stack::{Ipv4Settings, MockIpStack};

    fn quick_settings() -> DriverConfig {
        DriverConfig {
            connect_timeout_ms: 50,
            poll_interval_ms: 1,
            ..DriverConfig::default()
        }
    }

    /// Radio whose init stores the event handle so expectations can answer
    /// through it.
    fn radio_with_events() -> (MockRadio, Arc<Mutex<Option<DriverEvents>>>) {
        let slot = Arc::new(Mutex::new(None));
        let mut radio = MockRadio::new();
        let init_slot = slot.clone();
        radio.expect_init().times(1).returning(move |events| {
            *init_slot.lock().unwrap() = Some(events);
            Ok(())
        });
        radio.expect_supports_concurrent_mode().return_const(true);
        (radio, slot)
    }

    #[test]
    fn bad_wep_key_never_reaches_the_radio() {
        let (radio, _events) = radio_with_events();
        let stack = MockIpStack::new();
        let mut drv = WifiDrv::new(radio, stack, quick_settings()).unwrap();

        let err = drv.wifi_set_key("legacy", 0, &[1, 2, 3, 4, 5, 6, 7]).unwrap_err();
        assert_eq!(err, WifiError::InvalidWepKey(7));
        assert!(err.is_local_rejection());
        assert_eq!(drv.connection_status(), WlStatus::Idle);
    }

    #[test]
    fn hostname_reaches_the_stack_before_dhcp() {
        let (mut radio, events) = radio_with_events();
        let reply = events.clone();
        radio.expect_connect().times(1).returning(move |request| {
            assert_eq!(request.credential, Credential::Open);
            if let Some(events) = reply.lock().unwrap().as_ref() {
                events.associated(request.attempt);
            }
            Ok(())
        });

        let mut seq = Sequence::new();
        let mut stack = MockIpStack::new();
        stack
            .expect_set_hostname()
            .with(eq(Interface::Station), eq("sensor"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        stack
            .expect_set_dhcp()
            .with(eq(Interface::Station), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        stack
            .expect_wait_for_lease()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        stack.expect_ipv4().return_const(Ipv4Settings {
            address: Ipv4Addr::new(192, 168, 1, 100),
            ..Ipv4Settings::UNSPECIFIED
        });

        let mut drv = WifiDrv::new(radio, stack, quick_settings()).unwrap();
        drv.set_hostname("sensor");
        drv.wifi_set_network("guest").unwrap();
        assert_eq!(drv.connection_status(), WlStatus::Connected);
    }

    #[test]
    fn radio_refusal_marks_connect_failed() {
        let (mut radio, _events) = radio_with_events();
        radio
            .expect_connect()
            .returning(|_| Err(RadioError::UnsupportedSecurity));
        let mut drv = WifiDrv::new(radio, MockIpStack::new(), quick_settings()).unwrap();

        let err = drv.wifi_set_passphrase("home", "correcthorse").unwrap_err();
        assert_eq!(err, WifiError::Radio(RadioError::UnsupportedSecurity));
        assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
    }

    #[test]
    fn silent_radio_times_out_and_aborts() {
        let (mut radio, _events) = radio_with_events();
        radio.expect_connect().returning(|_| Ok(()));
        radio.expect_disconnect().times(1).returning(|| Ok(()));
        let mut drv = WifiDrv::new(radio, MockIpStack::new(), quick_settings()).unwrap();

        let err = drv.wifi_set_network("guest").unwrap_err();
        assert_eq!(err, WifiError::Timeout("association"));
        assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
    }

    #[test]
    fn late_outcome_of_a_timed_out_attempt_is_ignored() {
        let (mut radio, events) = radio_with_events();
        let reply = events.clone();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = attempts.clone();
        radio.expect_connect().times(2).returning(move |request| {
            let mut seen = seen.lock().unwrap();
            // second attempt: the driver only now answers the first one
            if let (Some(first), Some(events)) = (seen.first(), reply.lock().unwrap().as_ref()) {
                events.associated(*first);
            }
            seen.push(request.attempt);
            Ok(())
        });
        radio.expect_disconnect().times(2).returning(|| Ok(()));
        let mut drv = WifiDrv::new(radio, MockIpStack::new(), quick_settings()).unwrap();

        assert_eq!(
            drv.wifi_set_network("guest").unwrap_err(),
            WifiError::Timeout("association")
        );
        assert_eq!(
            drv.wifi_set_network("guest").unwrap_err(),
            WifiError::Timeout("association")
        );
        assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
        let attempts = attempts.lock().unwrap();
        assert_ne!(attempts[0], attempts[1]);
    }

    #[test]
    fn lease_timeout_marks_connect_failed() {
        let (mut radio, events) = radio_with_events();
        let reply = events.clone();
        radio.expect_connect().returning(move |request| {
            if let Some(events) = reply.lock().unwrap().as_ref() {
                events.associated(request.attempt);
            }
            Ok(())
        });
        radio.expect_disconnect().times(1).returning(|| Ok(()));
        let mut stack = MockIpStack::new();
        stack.expect_set_dhcp().returning(|_, _| Ok(()));
        stack
            .expect_wait_for_lease()
            .returning(|_, _| Err(crate::error::StackError::LeaseTimeout));

        let mut drv = WifiDrv::new(radio, stack, quick_settings()).unwrap();
        let err = drv.wifi_set_network("guest").unwrap_err();
        assert_eq!(err, WifiError::Stack(crate::error::StackError::LeaseTimeout));
        assert_eq!(drv.station_status(), WlStatus::ConnectFailed);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut radio, _events) = radio_with_events();
        radio.expect_disconnect().times(1).returning(|| Ok(()));
        let mut drv = WifiDrv::new(radio, MockIpStack::new(), quick_settings()).unwrap();

        assert_eq!(drv.disconnect(), Ok(()));
        assert_eq!(drv.connection_status(), WlStatus::Disconnected);
        assert_eq!(drv.disconnect(), Ok(()));
        assert_eq!(drv.connection_status(), WlStatus::Disconnected);
    }

    #[test]
    fn poll_until_gives_up_after_timeout() {
        let mut calls = 0;
        let result: Option<()> = poll_until(Duration::from_millis(5), Duration::from_millis(1), || {
            calls += 1;
            None
        });
        assert!(result.is_none());
        assert!(calls >= 2);
        assert_eq!(
            poll_until(Duration::ZERO, Duration::from_millis(1), || Some(7)),
            Some(7)
        );
    }
}
