//! IP stack collaborator contract (LwIP-style netif API).

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::definitions::Ipv6Status;
use crate::error::StackError;
use crate::interface::Interface;

/// DNS server slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsSlot {
    Primary,
    Secondary,
}

impl DnsSlot {
    /// Slot number as used by the stack's server table.
    pub fn index(self) -> usize {
        match self {
            DnsSlot::Primary => 0,
            DnsSlot::Secondary => 1,
        }
    }
}

/// IPv4 addressing of one interface as the stack currently holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Settings {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Ipv4Settings {
    pub const UNSPECIFIED: Ipv4Settings = Ipv4Settings {
        address: Ipv4Addr::UNSPECIFIED,
        netmask: Ipv4Addr::UNSPECIFIED,
        gateway: Ipv4Addr::UNSPECIFIED,
    };
}

impl Default for Ipv4Settings {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

/// Link-local IPv6 state of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv6Settings {
    /// `None` until the address has been generated.
    pub address: Option<Ipv6Addr>,
    pub status: Ipv6Status,
}

/// Network-layer collaborator. Interfaces are addressed by [`Interface`];
/// DNS servers are global.
#[cfg_attr(test, automock)]
pub trait IpStack {
    /// Must be called before DHCP starts so the name goes out in the
    /// client identification.
    fn set_hostname(&mut self, iface: Interface, hostname: &str) -> Result<(), StackError>;

    /// Start or stop the DHCP client on `iface`.
    fn set_dhcp(&mut self, iface: Interface, enabled: bool) -> Result<(), StackError>;

    /// Block until the DHCP client holds a lease.
    ///
    /// # Arguments
    /// * `iface` - Interface whose DHCP client was started
    /// * `timeout` - Upper bound on the wait
    ///
    /// # Returns
    /// [`StackError::LeaseTimeout`] when no lease arrived in time.
    fn wait_for_lease(&mut self, iface: Interface, timeout: Duration) -> Result<(), StackError>;

    /// `None` leaves the stack's current value in place.
    fn set_static_ipv4(
        &mut self,
        iface: Interface,
        address: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
        netmask: Option<Ipv4Addr>,
    ) -> Result<(), StackError>;

    /// Start or stop the DHCP server handing out addresses to AP clients.
    fn set_dhcp_server(&mut self, iface: Interface, enabled: bool) -> Result<(), StackError>;

    fn ipv4(&self, iface: Interface) -> Ipv4Settings;

    fn ipv6(&self, iface: Interface) -> Ipv6Settings;

    /// Overwrite one DNS server slot.
    fn set_dns_server(&mut self, slot: DnsSlot, server: Ipv4Addr) -> Result<(), StackError>;

    fn dns_server(&self, slot: DnsSlot) -> Ipv4Addr;

    /// `Ok(None)` when the name does not exist.
    fn resolve_ipv4(&mut self, host: &str) -> Result<Option<Ipv4Addr>, StackError>;

    fn resolve_ipv6(&mut self, host: &str) -> Result<Option<Ipv6Addr>, StackError>;
}
