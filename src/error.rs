use thiserror::Error;

use crate::definitions::{WL_FAILURE, WL_SUCCESS};

/// Failure reported by the radio driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("Radio driver returned status {0}")]
    Driver(i32),

    #[error("Security mode not supported by the radio")]
    UnsupportedSecurity,

    #[error("Radio is not associated")]
    NotAssociated,

    #[error("Radio is not initialized")]
    NotInitialized,
}

/// Failure reported by the IP stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("IP stack returned status {0}")]
    Driver(i32),

    #[error("Timed out waiting for a DHCP lease")]
    LeaseTimeout,

    #[error("DNS transport error {0}")]
    Transport(i32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    #[error("SSID must be 1..=32 octets, got {0}")]
    InvalidSsid(usize),

    #[error("Passphrase must be 8..=63 printable ASCII characters")]
    InvalidPassphrase,

    #[error("WEP key must be 5 or 13 octets, got {0}")]
    InvalidWepKey(usize),

    #[error("WEP key index must be 0..=3, got {0}")]
    InvalidKeyIndex(u8),

    #[error("Invalid channel '{0}'")]
    InvalidChannel(String),

    #[error("Valid parameter count {0} out of range")]
    InvalidParamCount(u8),

    #[error("Access point SSID not configured")]
    ApNotConfigured,

    #[error("Network '{0}' not found")]
    NoSsidAvail(String),

    #[error("Association with '{0}' failed")]
    AssociationFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Host '{0}' not found")]
    HostNotFound(String),

    #[error("DNS lookup failed: {0}")]
    Dns(StackError),

    #[error(transparent)]
    Radio(#[from] RadioError),

    #[error(transparent)]
    Stack(#[from] StackError),
}

impl WifiError {
    /// Status code as seen by Arduino sketches: `WL_FAILURE` for everything
    /// except DNS transport failures, which are negative.
    pub fn code(&self) -> i32 {
        match self {
            WifiError::Dns(StackError::Transport(code)) if *code < 0 => *code,
            WifiError::Dns(_) => -1,
            _ => WL_FAILURE,
        }
    }

    /// Input refused before anything was sent to the radio.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            WifiError::InvalidSsid(_)
                | WifiError::InvalidPassphrase
                | WifiError::InvalidWepKey(_)
                | WifiError::InvalidKeyIndex(_)
                | WifiError::InvalidChannel(_)
                | WifiError::InvalidParamCount(_)
                | WifiError::ApNotConfigured
        )
    }
}

pub type Result<T> = core::result::Result<T, WifiError>;

/// Collapse a facade result into its `WL_SUCCESS` / `WL_FAILURE` code.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => WL_SUCCESS,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_failures_map_to_negative_codes() {
        assert_eq!(WifiError::Dns(StackError::Transport(-6)).code(), -6);
        assert_eq!(WifiError::Dns(StackError::Driver(3)).code(), -1);
        assert_eq!(WifiError::HostNotFound("x".into()).code(), 0);
    }

    #[test]
    fn status_code_follows_result() {
        assert_eq!(status_code::<()>(&Ok(())), WL_SUCCESS);
        assert_eq!(status_code::<()>(&Err(WifiError::ApNotConfigured)), WL_FAILURE);
    }

    #[test]
    fn local_rejections_are_flagged() {
        assert!(WifiError::InvalidWepKey(7).is_local_rejection());
        assert!(!WifiError::Timeout("association").is_local_rejection());
        assert!(!WifiError::Radio(RadioError::Driver(-1)).is_local_rejection());
    }
}
