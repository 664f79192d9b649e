//! Arduino-style WiFi driver facade.
//!
//! This library presents the uniform `WiFiDrv` API Arduino sketches expect
//! (join a network, run a soft AP, scan, configure IPv4/IPv6 addressing,
//! resolve hostnames) on top of a vendor radio driver and an LwIP-style IP
//! stack. Both are collaborators behind the [`Radio`] and [`IpStack`] traits;
//! the interesting part lives in [`WifiDrv`], which stages user intent,
//! commits it against the asynchronous driver and keeps the status callers
//! observe coherent.
//!
//! # Modules
//!
//! - [`config`] - Controller tunables and bench configuration files
//! - [`connection`] - The interface controller and station commits
//! - [`definitions`] - Caller-facing constants, status and encryption enums
//! - [`error`] - Error types and status-code mapping
//! - [`interface`] - Interface identifiers and driver-shared status words
//! - [`radio`] - Radio collaborator trait and driver callback handle
//! - [`scan`] - Scan staging buffer and published scan table
//! - [`sim`] - Simulated radio and IP stack for benches and tests
//! - [`stack`] - IP stack collaborator trait
//! - [`staging`] - Configuration staging store and input validation
//!
//! # Example Usage
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use ambd_wifi::{DriverConfig, WifiDrv, WlStatus, sim};
//!
//! let (radio, stack, _ctl) = sim::bench(sim::SimEnvironment::default());
//! let mut drv = WifiDrv::new(radio, stack, DriverConfig::default()).expect("driver init");
//!
//! drv.config(
//!     3,
//!     Ipv4Addr::new(192, 168, 1, 50),
//!     Ipv4Addr::new(192, 168, 1, 1),
//!     Ipv4Addr::new(255, 255, 255, 0),
//! )
//! .expect("static ip");
//! drv.wifi_set_passphrase("alpha", "correcthorse").expect("connect");
//! assert_eq!(drv.connection_status(), WlStatus::Connected);
//! ```

mod ap;
mod query;

pub mod config;
pub mod connection;
pub mod definitions;
pub mod error;
pub mod interface;
pub mod radio;
pub mod scan;
pub mod sim;
pub mod stack;
pub mod staging;

pub use config::DriverConfig;
pub use connection::WifiDrv;
pub use definitions::{
    EncType, FwVersion, HOSTNAME_LEN, Ipv6Status, KEY_IDX_LEN, MacAddress, Security, Ssid,
    WL_DELAY_START_CONNECTION, WL_FAILURE, WL_FW_VER_LENGTH, WL_MAC_ADDR_LENGTH,
    WL_NETWORKS_LIST_MAXNUM, WL_SSID_MAX_LENGTH, WL_SUCCESS, WlStatus,
};
pub use error::{RadioError, Result, StackError, WifiError, status_code};
pub use interface::{AttemptId, Interface};
pub use radio::{ApParams, ConnectRequest, Credential, DriverEvents, Radio};
pub use scan::{ScanControl, ScanEntry, ScanId};
pub use stack::{DnsSlot, IpStack, Ipv4Settings, Ipv6Settings};
