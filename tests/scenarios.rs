//! End-to-end sketches against the simulated radio and IP stack.

use std::net::Ipv4Addr;

use ambd_wifi::sim::{self, SimEnvironment, SimEvent, SimNetwork, SimControl, SimRadio, SimStack};
use ambd_wifi::{
    DnsSlot, DriverConfig, EncType, Interface, Ipv6Status, WifiDrv, WifiError, WlStatus,
    status_code, WL_FAILURE, WL_SUCCESS,
};

type Driver = WifiDrv<SimRadio, SimStack>;

const WEP_KEY: [u8; 5] = [0x01, 0x02, 0x03, 0x04, 0x05];

fn settings() -> DriverConfig {
    DriverConfig {
        connect_timeout_ms: 1_000,
        poll_interval_ms: 1,
        ..DriverConfig::default()
    }
}

fn driver_in(env: SimEnvironment) -> (Driver, SimControl) {
    let (radio, stack, ctl) = sim::bench(env);
    let drv = WifiDrv::new(radio, stack, settings()).unwrap();
    (drv, ctl)
}

fn driver() -> (Driver, SimControl) {
    driver_in(SimEnvironment::default())
}

fn position(log: &[SimEvent], wanted: impl Fn(&SimEvent) -> bool) -> usize {
    log.iter()
        .position(wanted)
        .unwrap_or_else(|| panic!("event missing from {log:#?}"))
}

#[test]
fn open_network_with_hostname() {
    let mut env = SimEnvironment::default();
    env.networks.push(SimNetwork::open("guest", 0x05, -55));
    let (mut drv, ctl) = driver_in(env);
    drv.set_hostname("sensor");

    let result = drv.wifi_set_network("guest");
    assert_eq!(status_code(&result), WL_SUCCESS);
    assert_eq!(drv.connection_status(), WlStatus::Connected);
    assert_ne!(drv.ip_address(), Ipv4Addr::UNSPECIFIED);

    let log = ctl.log();
    let hostname = position(&log, |e| {
        matches!(e, SimEvent::Hostname { iface: Interface::Station, hostname } if hostname == "sensor")
    });
    let dhcp = position(&log, |e| {
        matches!(e, SimEvent::Dhcp { iface: Interface::Station, enabled: true })
    });
    let lease = position(&log, |e| {
        matches!(e, SimEvent::Lease { hostname, .. } if hostname == "sensor")
    });
    assert!(hostname < dhcp && dhcp < lease);

    let connect = log
        .iter()
        .find_map(|e| match e {
            SimEvent::Connect { status, .. } => Some(*status),
            _ => None,
        })
        .unwrap();
    assert_eq!(connect, WlStatus::Connecting);
}

#[test]
fn wpa2_with_static_address_and_dns() {
    let mut env = SimEnvironment::default();
    env.networks
        .push(SimNetwork::wpa2("home", 0x10, -40, "correcthorse"));
    let (mut drv, ctl) = driver_in(env);

    drv.config(
        3,
        Ipv4Addr::new(192, 168, 1, 50),
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(255, 255, 255, 0),
    )
    .unwrap();
    drv.set_dns(1, Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(9, 9, 9, 9))
        .unwrap();
    drv.wifi_set_passphrase("home", "correcthorse").unwrap();

    assert_eq!(drv.connection_status(), WlStatus::Connected);
    assert_eq!(drv.ip_address(), Ipv4Addr::new(192, 168, 1, 50));
    assert_eq!(drv.gateway_ip(), Ipv4Addr::new(192, 168, 1, 1));
    assert_eq!(drv.subnet_mask(), Ipv4Addr::new(255, 255, 255, 0));
    assert_eq!(drv.dns_server(DnsSlot::Primary), Ipv4Addr::new(1, 1, 1, 1));
    assert_eq!(drv.dns_server(DnsSlot::Secondary), Ipv4Addr::UNSPECIFIED);
    assert_eq!(drv.current_encryption_type(), EncType::Ccmp);

    let log = ctl.log();
    assert!(!log.iter().any(|e| matches!(e, SimEvent::Lease { .. })));
    assert!(log.iter().any(|e| matches!(
        e,
        SimEvent::StaticIpv4 { netmask: Some(_), gateway: Some(_), .. }
    )));
}

#[test]
fn partial_static_config_keeps_stack_netmask() {
    let (mut drv, _ctl) = driver();
    drv.config(1, Ipv4Addr::new(10, 0, 0, 7), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::BROADCAST)
        .unwrap();
    drv.wifi_set_network("beta").unwrap();

    assert_eq!(drv.ip_address(), Ipv4Addr::new(10, 0, 0, 7));
    assert_eq!(drv.subnet_mask(), Ipv4Addr::new(255, 255, 255, 0));
    assert_eq!(drv.gateway_ip(), Ipv4Addr::UNSPECIFIED);
}

#[test]
fn dns_staged_without_static_ip_overrides_the_lease() {
    let (mut drv, ctl) = driver();
    drv.set_dns(1, Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::UNSPECIFIED)
        .unwrap();
    drv.wifi_set_network("beta").unwrap();

    assert_eq!(drv.ip_address(), Ipv4Addr::new(192, 168, 1, 100));
    assert_eq!(drv.dns_server(DnsSlot::Primary), Ipv4Addr::new(8, 8, 8, 8));

    let log = ctl.log();
    let lease = position(&log, |e| matches!(e, SimEvent::Lease { .. }));
    let dns = position(&log, |e| {
        matches!(e, SimEvent::Dns { slot: DnsSlot::Primary, .. })
    });
    assert!(lease < dns);
}

#[test]
fn staging_after_a_commit_waits_for_the_next_connect() {
    let (mut drv, _ctl) = driver();
    drv.wifi_set_network("beta").unwrap();
    let lease_dns = drv.dns_server(DnsSlot::Primary);
    assert_eq!(drv.ip_address(), Ipv4Addr::new(192, 168, 1, 100));

    drv.config(1, Ipv4Addr::new(10, 0, 0, 7), Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED)
        .unwrap();
    drv.set_dns(1, Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::UNSPECIFIED)
        .unwrap();
    assert_eq!(drv.connection_status(), WlStatus::Connected);
    assert_eq!(drv.ip_address(), Ipv4Addr::new(192, 168, 1, 100));
    assert_eq!(drv.dns_server(DnsSlot::Primary), lease_dns);

    drv.disconnect().unwrap();
    drv.wifi_set_network("beta").unwrap();
    assert_eq!(drv.ip_address(), Ipv4Addr::new(10, 0, 0, 7));
    assert_eq!(drv.dns_server(DnsSlot::Primary), Ipv4Addr::new(8, 8, 8, 8));
}

#[test]
fn wep_key_length_is_checked_before_association() {
    let mut env = SimEnvironment::default();
    env.networks.push(SimNetwork::wep("legacy", 0x20, -60, &WEP_KEY));
    let (mut drv, ctl) = driver_in(env);

    drv.wifi_set_key("legacy", 0, &WEP_KEY).unwrap();
    assert_eq!(drv.connection_status(), WlStatus::Connected);
    assert_eq!(drv.current_encryption_type(), EncType::Wep);

    ctl.clear_log();
    let result = drv.wifi_set_key("legacy", 0, &[1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(status_code(&result), WL_FAILURE);
    assert_eq!(result, Err(WifiError::InvalidWepKey(7)));
    assert_eq!(drv.connection_status(), WlStatus::Connected);
    assert!(ctl.log().is_empty());
}

#[test]
fn scan_then_connect_by_index() {
    let (mut drv, ctl) = driver();

    assert_eq!(drv.start_scan_networks(), Ok(2));
    assert_eq!(drv.scan_networks(), 2);
    assert_eq!(drv.ssid_networks(0), "alpha");
    assert_eq!(drv.ssid_networks(1), "beta");
    assert_eq!(drv.enc_type_networks(0), EncType::Ccmp);
    assert_eq!(drv.enc_type_networks(1), EncType::None);
    assert_eq!(drv.rssi_networks(0), -50);
    assert_eq!(drv.bssid_networks(1), Some([0x02, 0, 0, 0, 0, 0x02]));

    assert!(drv.ssid_networks(2).is_empty());
    assert_eq!(drv.rssi_networks(2), 0);
    assert_eq!(drv.enc_type_networks(2), EncType::Unknown);

    let ssid = drv.ssid_networks(1).to_string();
    drv.wifi_set_network(&ssid).unwrap();
    assert_eq!(ctl.associated_ssid().as_deref(), Some("beta"));
}

#[test]
fn second_scan_replaces_the_first() {
    let (mut drv, ctl) = driver();
    drv.start_scan_networks().unwrap();

    ctl.update(|env| {
        env.networks.retain(|n| n.ssid == "beta");
        env.networks.push(SimNetwork::open("gamma", 0x03, -80));
    });
    assert_eq!(drv.start_scan_networks(), Ok(2));
    assert_eq!(drv.ssid_networks(0), "beta");
    assert_eq!(drv.ssid_networks(1), "gamma");
}

#[test]
fn late_results_of_a_timed_out_scan_are_discarded() {
    let env = SimEnvironment {
        latency_ms: 400,
        ..SimEnvironment::default()
    };
    let (radio, stack, ctl) = sim::bench(env);
    let mut drv = WifiDrv::new(
        radio,
        stack,
        DriverConfig {
            scan_timeout_ms: 300,
            poll_interval_ms: 1,
            ..DriverConfig::default()
        },
    )
    .unwrap();
    assert_eq!(drv.start_scan_networks(), Err(WifiError::Timeout("scan")));

    // alpha and beta from the first scan arrive while the second one runs
    ctl.update(|env| {
        env.networks = vec![SimNetwork::open("gamma", 0x03, -80)];
        env.latency_ms = 150;
    });
    assert_eq!(drv.start_scan_networks(), Ok(1));
    assert_eq!(drv.ssid_networks(0), "gamma");
}

#[test]
fn duplicate_sightings_are_collapsed() {
    let mut env = SimEnvironment::default();
    env.networks.push(SimNetwork::open("beta", 0x02, -30));
    env.networks.push(SimNetwork::open("beta", 0x09, -75));
    let (mut drv, _ctl) = driver_in(env);

    assert_eq!(drv.start_scan_networks(), Ok(3));
    assert_eq!(drv.rssi_networks(1), -70);
    assert_eq!(drv.bssid_networks(2), Some([0x02, 0, 0, 0, 0, 0x09]));
}

#[test]
fn scan_stops_at_list_capacity() {
    let mut env = SimEnvironment::default();
    env.networks = (0..60)
        .map(|i| SimNetwork::open(&format!("net{i}"), i, -60))
        .collect();
    let (mut drv, _ctl) = driver_in(env);

    assert_eq!(
        drv.start_scan_networks(),
        Ok(ambd_wifi::WL_NETWORKS_LIST_MAXNUM as u8)
    );
    assert_eq!(drv.ssid_networks(49), "net49");
}

#[test]
fn unknown_network_reports_no_ssid() {
    let (mut drv, _ctl) = driver();
    let result = drv.wifi_set_passphrase("ghost", "password");
    assert_eq!(result, Err(WifiError::NoSsidAvail("ghost".into())));
    assert_eq!(drv.connection_status(), WlStatus::NoSsidAvail);
}

#[test]
fn wrong_passphrase_fails_the_connect() {
    let (mut drv, _ctl) = driver();
    let result = drv.wifi_set_passphrase("alpha", "batterystaple");
    assert_eq!(result, Err(WifiError::AssociationFailed("alpha".into())));
    assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
}

#[test]
fn silent_network_times_out() {
    let mut env = SimEnvironment::default();
    let mut quiet = SimNetwork::open("quiet", 0x30, -65);
    quiet.silent = true;
    env.networks.push(quiet);
    let (radio, stack, ctl) = sim::bench(env);
    let mut drv = WifiDrv::new(
        radio,
        stack,
        DriverConfig {
            connect_timeout_ms: 30,
            poll_interval_ms: 1,
            ..DriverConfig::default()
        },
    )
    .unwrap();

    assert_eq!(
        drv.wifi_set_network("quiet"),
        Err(WifiError::Timeout("association"))
    );
    assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
    assert!(ctl.log().contains(&SimEvent::Disconnect));
}

#[test]
fn late_association_does_not_complete_the_next_attempt() {
    let mut env = SimEnvironment {
        latency_ms: 150,
        ..SimEnvironment::default()
    };
    let mut quiet = SimNetwork::open("quiet", 0x30, -65);
    quiet.silent = true;
    env.networks.push(quiet);
    let (radio, stack, ctl) = sim::bench(env);
    let mut drv = WifiDrv::new(
        radio,
        stack,
        DriverConfig {
            connect_timeout_ms: 100,
            poll_interval_ms: 1,
            ..DriverConfig::default()
        },
    )
    .unwrap();

    assert_eq!(
        drv.wifi_set_network("beta"),
        Err(WifiError::Timeout("association"))
    );
    // beta's association lands while quiet is still pending
    assert_eq!(
        drv.wifi_set_network("quiet"),
        Err(WifiError::Timeout("association"))
    );
    assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
    assert_eq!(ctl.associated_ssid(), None);
}

#[test]
fn lease_failure_fails_the_connect() {
    let env = SimEnvironment {
        dhcp_fails: true,
        ..SimEnvironment::default()
    };
    let (mut drv, ctl) = driver_in(env);

    assert!(drv.wifi_set_network("beta").is_err());
    assert_eq!(drv.connection_status(), WlStatus::ConnectFailed);
    assert_eq!(ctl.associated_ssid(), None);
}

#[test]
fn link_loss_is_reported() {
    let (mut drv, ctl) = driver();
    drv.wifi_set_network("beta").unwrap();

    ctl.drop_link();
    assert_eq!(drv.connection_status(), WlStatus::ConnectionLost);
    assert_eq!(drv.current_rssi(), 0);
    assert_eq!(drv.current_bssid(), [0; 6]);

    drv.wifi_set_network("beta").unwrap();
    assert_eq!(drv.connection_status(), WlStatus::Connected);
}

#[test]
fn reconnect_without_staging_uses_dhcp() {
    let (mut drv, ctl) = driver();
    drv.config(1, Ipv4Addr::new(192, 168, 1, 50), Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED)
        .unwrap();
    drv.wifi_set_passphrase("alpha", "correcthorse").unwrap();
    assert_eq!(drv.ip_address(), Ipv4Addr::new(192, 168, 1, 50));

    drv.disconnect().unwrap();
    assert_eq!(drv.connection_status(), WlStatus::Disconnected);

    ctl.clear_log();
    drv.wifi_set_passphrase("alpha", "correcthorse").unwrap();
    assert_eq!(drv.ip_address(), Ipv4Addr::new(192, 168, 1, 100));
    assert!(ctl.log().contains(&SimEvent::Dhcp {
        iface: Interface::Station,
        enabled: true,
    }));
}

#[test]
fn soft_ap_lifecycle() {
    let (mut drv, ctl) = driver();

    assert_eq!(drv.ap_activate(false), Err(WifiError::ApNotConfigured));
    assert_eq!(drv.ap_status(), None);

    drv.ap_set_network("myap").unwrap();
    drv.ap_set_passphrase("secret12").unwrap();
    drv.ap_set_channel("6").unwrap();
    assert!(drv.ap_set_channel("99").is_err());
    drv.ap_activate(false).unwrap();

    assert_eq!(drv.connection_status(), WlStatus::ApListening);
    let params = ctl.ap().unwrap();
    assert_eq!(params.ssid, "myap");
    assert_eq!(params.channel, 6);
    assert!(params.passphrase.is_some());
    assert!(!params.hidden);
    assert!(ctl.log().contains(&SimEvent::DhcpServer {
        iface: Interface::AccessPoint,
        enabled: true,
    }));

    ctl.ap_client_joins();
    assert_eq!(drv.connection_status(), WlStatus::ApConnected);
    ctl.ap_client_leaves();
    assert_eq!(drv.connection_status(), WlStatus::ApListening);

    drv.ap_deactivate().unwrap();
    assert_eq!(drv.ap_status(), None);
    assert_eq!(ctl.ap(), None);
}

#[test]
fn ap_start_failure_is_sticky_until_next_commit() {
    let env = SimEnvironment {
        ap_start_fails: true,
        ..SimEnvironment::default()
    };
    let (mut drv, ctl) = driver_in(env);
    drv.ap_set_network("myap").unwrap();

    assert!(drv.ap_activate(false).is_err());
    assert_eq!(drv.connection_status(), WlStatus::ApFailed);

    ctl.update(|env| env.ap_start_fails = false);
    drv.ap_activate(true).unwrap();
    assert_eq!(drv.connection_status(), WlStatus::ApListening);
    assert!(ctl.ap().unwrap().hidden);
}

#[test]
fn concurrent_radio_keeps_both_interfaces() {
    let (mut drv, ctl) = driver();
    drv.wifi_set_network("beta").unwrap();
    drv.ap_set_network("myap").unwrap();
    drv.ap_activate(false).unwrap();

    assert_eq!(drv.station_status(), WlStatus::Connected);
    assert_eq!(drv.ap_status(), Some(WlStatus::ApListening));
    assert_eq!(drv.connection_status(), WlStatus::ApListening);
    assert!(!ctl.log().contains(&SimEvent::Disconnect));
}

#[test]
fn single_mode_radio_switches_roles() {
    let env = SimEnvironment {
        concurrent_mode: false,
        ..SimEnvironment::default()
    };
    let (mut drv, ctl) = driver_in(env);
    drv.wifi_set_network("beta").unwrap();

    drv.ap_set_network("myap").unwrap();
    drv.ap_activate(false).unwrap();
    assert_eq!(drv.station_status(), WlStatus::Disconnected);
    assert_eq!(drv.connection_status(), WlStatus::ApListening);
    let log = ctl.log();
    let dropped = position(&log, |e| *e == SimEvent::Disconnect);
    let started = position(&log, |e| matches!(e, SimEvent::StartAp(_)));
    assert!(dropped < started);

    drv.wifi_set_network("beta").unwrap();
    assert_eq!(drv.ap_status(), None);
    assert_eq!(ctl.ap(), None);
    assert_eq!(drv.connection_status(), WlStatus::Connected);
}

#[test]
fn driver_answers_from_its_own_thread() {
    let env = SimEnvironment {
        latency_ms: 20,
        ..SimEnvironment::default()
    };
    let (mut drv, _ctl) = driver_in(env);

    assert_eq!(drv.start_scan_networks(), Ok(2));
    drv.wifi_set_passphrase("alpha", "correcthorse").unwrap();
    assert_eq!(drv.connection_status(), WlStatus::Connected);
    assert_eq!(drv.current_ssid(), "alpha");
    assert_eq!(drv.current_rssi(), -50);
}

#[test]
fn invalid_input_is_rejected_locally() {
    let (mut drv, ctl) = driver();

    assert_eq!(drv.wifi_set_network(""), Err(WifiError::InvalidSsid(0)));
    assert_eq!(
        drv.wifi_set_network(&"x".repeat(33)),
        Err(WifiError::InvalidSsid(33))
    );
    assert_eq!(
        drv.wifi_set_passphrase("alpha", "short"),
        Err(WifiError::InvalidPassphrase)
    );
    assert_eq!(
        drv.config(4, Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST),
        Err(WifiError::InvalidParamCount(4))
    );
    assert_eq!(
        drv.set_dns(3, Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST),
        Err(WifiError::InvalidParamCount(3))
    );

    assert_eq!(drv.connection_status(), WlStatus::Idle);
    assert!(ctl.log().is_empty());
}

#[test]
fn hostnames_resolve_through_the_stack() {
    let (mut drv, ctl) = driver();
    drv.wifi_set_network("beta").unwrap();

    assert_eq!(
        drv.host_by_name("example.com"),
        Ok(Ipv4Addr::new(93, 184, 216, 34))
    );
    assert!(drv.host_by_name_v6("example.com").is_ok());
    assert_eq!(drv.host_by_name("nowhere.invalid").unwrap_err().code(), 0);

    ctl.update(|env| env.dns_unreachable = true);
    let err = drv.host_by_name("example.com").unwrap_err();
    assert_eq!(err.code(), sim::SIM_DNS_TRANSPORT_ERROR);
}

#[test]
fn ipv6_follows_the_lease() {
    let env = SimEnvironment {
        global_ipv6: "2001:db8::42".parse().ok(),
        ..SimEnvironment::default()
    };
    let (mut drv, _ctl) = driver_in(env);
    assert_eq!(drv.ipv6_status(), Ipv6Status::None);

    drv.wifi_set_network("beta").unwrap();
    assert_eq!(drv.ipv6_status(), Ipv6Status::GlobalValid);
    assert_eq!(drv.ipv6_address(), "2001:db8::42".parse::<std::net::Ipv6Addr>().unwrap());
}

#[test]
fn identity_queries() {
    let (mut drv, ctl) = driver();
    assert_eq!(drv.fw_version().as_str(), "1.0.0");
    assert_eq!(drv.mac_address(), [0x00, 0xe0, 0x4c, 0x87, 0x00, 0x01]);

    drv.disable_power_save().unwrap();
    assert!(ctl.log().contains(&SimEvent::PowerSave(false)));
}
