//! Soft access point.

use log::{debug, info, warn};

use crate::connection::{ApState, Focus, WifiDrv};
use crate::definitions::WlStatus;
use crate::error::{Result, WifiError};
use crate::interface::Interface;
use crate::radio::{ApParams, Radio};
use crate::stack::IpStack;

impl<R: Radio, S: IpStack> WifiDrv<R, S> {
    pub fn ap_set_network(&mut self, ssid: &str) -> Result<()> {
        self.staging.stage_ap_ssid(ssid)
    }

    /// Empty passphrase means an open AP.
    pub fn ap_set_passphrase(&mut self, passphrase: &str) -> Result<()> {
        self.staging.stage_ap_passphrase(passphrase)
    }

    /// Decimal channel number, 1..=14.
    pub fn ap_set_channel(&mut self, channel: &str) -> Result<()> {
        self.staging.stage_ap_channel(channel)
    }

    /// Start the soft AP from the staged parameters. A failed start leaves the
    /// staged parameters in place so the call can be retried.
    pub fn ap_activate(&mut self, hidden_ssid: bool) -> Result<()> {
        let staged = self.staging.ap();
        let Some(ssid) = staged.ssid.clone() else {
            debug!("ap activate without a staged ssid");
            return Err(WifiError::ApNotConfigured);
        };
        let params = ApParams {
            ssid,
            passphrase: staged.passphrase.clone(),
            channel: staged.channel.unwrap_or(self.settings.default_ap_channel),
            hidden: hidden_ssid,
        };

        self.focus = Focus::AccessPoint;
        let station = self.events.link().station_status();
        let station_busy = matches!(station, WlStatus::Connected | WlStatus::Connecting);
        if station_busy && !self.radio.supports_concurrent_mode() {
            info!("radio has no concurrent mode, dropping station link");
            if let Err(e) = self.radio.disconnect() {
                warn!("radio refused disconnect: {e}");
            }
            self.events.link().abandon_association();
            self.events.link().set_station_status(WlStatus::Disconnected);
        }

        if let Err(e) = self.radio.start_ap(&params) {
            warn!("soft AP '{}' failed to start: {e}", params.ssid);
            self.ap = ApState::Failed;
            return Err(e.into());
        }
        self.events.link().reset_ap_clients();

        if let Err(e) = self.address_ap() {
            warn!("soft AP addressing failed: {e}");
            if let Err(e) = self.radio.stop_ap() {
                warn!("radio refused to stop soft AP: {e}");
            }
            self.ap = ApState::Failed;
            return Err(e);
        }

        self.ap = ApState::Up;
        info!(
            "soft AP '{}' up on channel {} ({})",
            params.ssid,
            params.channel,
            if params.passphrase.is_some() { "wpa2" } else { "open" }
        );
        Ok(())
    }

    /// Stop the soft AP. A no-op while it is not running.
    pub fn ap_deactivate(&mut self) -> Result<()> {
        if self.ap == ApState::Off {
            return Ok(());
        }
        if let Err(e) = self.stack.set_dhcp_server(Interface::AccessPoint, false) {
            warn!("could not stop AP dhcp server: {e}");
        }
        if self.ap == ApState::Up {
            self.radio.stop_ap()?;
        }
        self.ap = ApState::Off;
        self.events.link().reset_ap_clients();
        self.focus = Focus::Station;
        info!("soft AP stopped");
        Ok(())
    }

    fn address_ap(&mut self) -> Result<()> {
        let address = self.settings.ap_address;
        self.stack.set_static_ipv4(
            Interface::AccessPoint,
            address,
            Some(address),
            Some(self.settings.ap_netmask),
        )?;
        self.stack.set_dhcp_server(Interface::AccessPoint, true)?;
        Ok(())
    }
}
