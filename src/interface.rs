//! Interface identifiers and the status words shared with the driver context.
//!
//! The radio driver runs in its own task and reports link changes through
//! [`crate::radio::DriverEvents`]. Everything it may touch from there lives in
//! [`LinkState`]: plain atomics written with release ordering and read with
//! acquire ordering, so the application task never needs a lock to observe
//! the latest status.
//!
//! Every association attempt gets a number. The driver echoes it back with
//! the outcome, and outcomes carrying a number other than the current one are
//! dropped, so a late answer to an abandoned attempt can never complete the
//! next one.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use crate::definitions::WlStatus;

/// Network interface of the IP stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Station,
    AccessPoint,
}

impl Interface {
    /// LwIP-style netif index.
    pub fn index(self) -> u8 {
        match self {
            Interface::Station => 0,
            Interface::AccessPoint => 1,
        }
    }
}

/// Outcome of the association attempt currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Association {
    Pending = 0,
    Associated = 1,
    Failed = 2,
    NoNetwork = 3,
}

impl Association {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Association::Associated,
            2 => Association::Failed,
            3 => Association::NoNetwork,
            _ => Association::Pending,
        }
    }
}

/// Number identifying one association attempt.
pub type AttemptId = u32;

fn pack(attempt: AttemptId, outcome: Association) -> u64 {
    (u64::from(attempt) << 8) | outcome as u64
}

fn unpack(word: u64) -> (AttemptId, Association) {
    // upper bits hold the attempt, the low byte the outcome
    ((word >> 8) as AttemptId, Association::from_u8(word as u8))
}

/// Status words written by the driver task and read by the controller.
#[derive(Debug)]
pub struct LinkState {
    /// Published station status ([`WlStatus`] as `u8`).
    station: AtomicU8,
    /// Current attempt number and its outcome, packed into one word.
    association: AtomicU64,
    /// Stations associated with the soft AP.
    ap_clients: AtomicU8,
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            station: AtomicU8::new(WlStatus::Idle as u8),
            association: AtomicU64::new(pack(0, Association::Failed)),
            ap_clients: AtomicU8::new(0),
        }
    }

    pub fn station_status(&self) -> WlStatus {
        WlStatus::from_u8(self.station.load(Ordering::Acquire)).unwrap_or(WlStatus::Idle)
    }

    pub fn set_station_status(&self, status: WlStatus) {
        self.station.store(status as u8, Ordering::Release);
    }

    /// Arm a new association attempt and publish `Connecting`.
    ///
    /// # Returns
    /// The number the driver must quote when reporting the outcome.
    pub fn begin_association(&self) -> AttemptId {
        let attempt = self.next_attempt(Association::Pending);
        self.set_station_status(WlStatus::Connecting);
        attempt
    }

    /// Give up on the attempt in flight. Whatever the driver still reports
    /// for it is ignored.
    pub fn abandon_association(&self) {
        self.next_attempt(Association::Failed);
    }

    fn next_attempt(&self, outcome: Association) -> AttemptId {
        let mut current = self.association.load(Ordering::Acquire);
        loop {
            let (attempt, _) = unpack(current);
            let next = attempt.wrapping_add(1);
            match self.association.compare_exchange_weak(
                current,
                pack(next, outcome),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Outcome of the current attempt.
    pub fn association(&self) -> Association {
        unpack(self.association.load(Ordering::Acquire)).1
    }

    /// Number of the current attempt.
    pub fn attempt(&self) -> AttemptId {
        unpack(self.association.load(Ordering::Acquire)).0
    }

    /// Record the outcome of `attempt`.
    ///
    /// # Returns
    /// `false` when `attempt` is no longer current and the report was dropped.
    pub fn report_association(&self, attempt: AttemptId, outcome: Association) -> bool {
        let mut current = self.association.load(Ordering::Acquire);
        loop {
            if unpack(current).0 != attempt {
                return false;
            }
            match self.association.compare_exchange_weak(
                current,
                pack(attempt, outcome),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Link dropped. A connected station becomes `ConnectionLost`; an attempt
    /// still in flight is marked failed so the waiting commit gives up.
    pub fn report_link_lost(&self) {
        let lost = self.station.compare_exchange(
            WlStatus::Connected as u8,
            WlStatus::ConnectionLost as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if lost.is_err() {
            self.report_association(self.attempt(), Association::Failed);
        }
    }

    /// Stations currently associated with the soft AP.
    pub fn ap_clients(&self) -> u8 {
        self.ap_clients.load(Ordering::Acquire)
    }

    pub fn ap_client_joined(&self) {
        let _ = self
            .ap_clients
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(1))
            });
    }

    pub fn ap_client_left(&self) {
        let _ = self
            .ap_clients
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn reset_ap_clients(&self) {
        self.ap_clients.store(0, Ordering::Release);
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}
