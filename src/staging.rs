//! Configuration staging store.
//!
//! Static addressing, DNS servers, the hostname and soft-AP parameters are
//! recorded here without touching the radio. A station commit applies the
//! staged IPv4/DNS settings and consumes them once they took effect, so a
//! later reconnect without fresh staging falls back to DHCP. The hostname and
//! the AP intent stay staged across commits.

use std::net::Ipv4Addr;

use log::debug;

use crate::definitions::{
    HOSTNAME_LEN, Ssid, WL_SSID_MAX_LENGTH, WL_WEP_40_KEY_LENGTH, WL_WEP_104_KEY_LENGTH,
    WL_WEP_KEY_INDEX_MAX, WL_WPA_KEY_MAX_LENGTH, WL_WPA_KEY_MIN_LENGTH,
};
use crate::error::{Result, WifiError};
use crate::radio::{Credential, Passphrase, WepKey};

pub type Hostname = heapless::String<HOSTNAME_LEN>;

/// Static IPv4 intent. Fields beyond the valid-params count are `None` and
/// keep the stack's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpv4 {
    pub address: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
}

impl StaticIpv4 {
    /// `Ok(None)` for a count of zero.
    pub fn from_params(
        valid_params: u8,
        address: Ipv4Addr,
        gateway: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Result<Option<Self>> {
        match valid_params {
            0 => Ok(None),
            1..=3 => Ok(Some(Self {
                address,
                gateway: (valid_params >= 2).then_some(gateway),
                netmask: (valid_params >= 3).then_some(netmask),
            })),
            n => Err(WifiError::InvalidParamCount(n)),
        }
    }

    pub fn valid_params(&self) -> u8 {
        match (self.gateway, self.netmask) {
            (None, _) => 1,
            (Some(_), None) => 2,
            (Some(_), Some(_)) => 3,
        }
    }
}

/// DNS intent; slots beyond the valid-params count are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsServers {
    pub primary: Ipv4Addr,
    pub secondary: Option<Ipv4Addr>,
}

impl DnsServers {
    pub fn from_params(valid_params: u8, primary: Ipv4Addr, secondary: Ipv4Addr) -> Result<Option<Self>> {
        match valid_params {
            0 => Ok(None),
            1 | 2 => Ok(Some(Self {
                primary,
                secondary: (valid_params == 2).then_some(secondary),
            })),
            n => Err(WifiError::InvalidParamCount(n)),
        }
    }
}

/// Soft-AP intent accumulated by the `ap_set_*` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApConfig {
    pub ssid: Option<Ssid>,
    pub passphrase: Option<Passphrase>,
    pub channel: Option<u8>,
}

/// Configuration recorded by setter calls and applied by the next commit.
#[derive(Debug, Default)]
pub struct Staging {
    static_ip: Option<StaticIpv4>,
    dns: Option<DnsServers>,
    hostname: Hostname,
    ap: ApConfig,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previously staged static configuration in full. A count
    /// of zero changes nothing.
    pub fn stage_static_ip(
        &mut self,
        valid_params: u8,
        address: Ipv4Addr,
        gateway: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Result<()> {
        if let Some(config) = StaticIpv4::from_params(valid_params, address, gateway, netmask)
            .inspect_err(|e| debug!("static ip rejected: {e}"))?
        {
            self.static_ip = Some(config);
        }
        Ok(())
    }

    pub fn stage_dns(&mut self, valid_params: u8, primary: Ipv4Addr, secondary: Ipv4Addr) -> Result<()> {
        if let Some(servers) = DnsServers::from_params(valid_params, primary, secondary)
            .inspect_err(|e| debug!("dns servers rejected: {e}"))?
        {
            self.dns = Some(servers);
        }
        Ok(())
    }

    pub fn static_ip(&self) -> Option<StaticIpv4> {
        self.static_ip
    }

    pub fn dns(&self) -> Option<DnsServers> {
        self.dns
    }

    /// Drop the IPv4/DNS intent after a commit applied it.
    pub fn consume_ip_config(&mut self) {
        self.static_ip = None;
        self.dns = None;
    }

    /// Silently truncated to [`HOSTNAME_LEN`] octets.
    pub fn set_hostname(&mut self, hostname: &str) {
        self.hostname.clear();
        for c in hostname.chars() {
            if self.hostname.push(c).is_err() {
                break;
            }
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ap(&self) -> &ApConfig {
        &self.ap
    }

    pub fn stage_ap_ssid(&mut self, ssid: &str) -> Result<()> {
        self.ap.ssid = Some(parse_ssid(ssid)?);
        Ok(())
    }

    /// An empty passphrase reverts the AP to open.
    pub fn stage_ap_passphrase(&mut self, passphrase: &str) -> Result<()> {
        self.ap.passphrase = if passphrase.is_empty() {
            None
        } else {
            Some(parse_passphrase(passphrase)?)
        };
        Ok(())
    }

    pub fn stage_ap_channel(&mut self, channel: &str) -> Result<()> {
        self.ap.channel = Some(parse_channel(channel)?);
        Ok(())
    }
}

pub fn parse_ssid(ssid: &str) -> Result<Ssid> {
    let len = ssid.len();
    if len == 0 || len > WL_SSID_MAX_LENGTH {
        debug!("ssid of {len} octets rejected");
        return Err(WifiError::InvalidSsid(len));
    }
    Ssid::from_bytes(ssid.as_bytes()).ok_or(WifiError::InvalidSsid(len))
}

/// Printable ASCII (32..=126), 8..=63 characters.
pub fn parse_passphrase(passphrase: &str) -> Result<Passphrase> {
    let len_ok = (WL_WPA_KEY_MIN_LENGTH..=WL_WPA_KEY_MAX_LENGTH).contains(&passphrase.len());
    let printable = passphrase.bytes().all(|b| (32..=126).contains(&b));
    if !len_ok || !printable {
        debug!("passphrase rejected (len {})", passphrase.len());
        return Err(WifiError::InvalidPassphrase);
    }
    Passphrase::try_from(passphrase).map_err(|_| WifiError::InvalidPassphrase)
}

/// WEP-40 for a 5-octet key, WEP-104 for 13 octets; anything else is refused.
pub fn parse_wep_key(index: u8, key: &[u8]) -> Result<Credential> {
    if key.len() != WL_WEP_40_KEY_LENGTH && key.len() != WL_WEP_104_KEY_LENGTH {
        debug!("wep key of {} octets rejected", key.len());
        return Err(WifiError::InvalidWepKey(key.len()));
    }
    if index > WL_WEP_KEY_INDEX_MAX {
        debug!("wep key index {index} rejected");
        return Err(WifiError::InvalidKeyIndex(index));
    }
    let key = WepKey::from_slice(key).map_err(|_| WifiError::InvalidWepKey(key.len()))?;
    Ok(Credential::Wep { index, key })
}

/// Decimal channel number, 1..=14.
pub fn parse_channel(channel: &str) -> Result<u8> {
    match channel.trim().parse::<u8>() {
        Ok(ch @ 1..=14) => Ok(ch),
        _ => {
            debug!("channel '{channel}' rejected");
            Err(WifiError::InvalidChannel(channel.to_string()))
        }
    }
}
