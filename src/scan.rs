//! Network scan cache.
//!
//! A scan has two halves living in different contexts:
//!
//! - [`ScanStaging`] is filled by the radio driver, one BSS per callback, from
//!   the driver task. Entries are deduplicated on (SSID, BSSID), the first
//!   sighting wins, and the table stops growing at
//!   [`WL_NETWORKS_LIST_MAXNUM`] entries.
//! - [`ScanCache`] is the published table read by the application. The
//!   controller moves the whole staging table into it once the driver has
//!   signalled completion, so readers only ever see a complete scan.
//!
//! Indices into the published table are dense and zero-based. Out-of-range
//! reads return sentinels (empty SSID, RSSI 0, [`EncType::Unknown`]).

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::definitions::{EncType, MacAddress, Security, Ssid, WL_NETWORKS_LIST_MAXNUM};

/// One BSS seen during the most recent completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: Ssid,
    /// Signal strength in dBm.
    pub rssi: i32,
    pub security: Security,
    pub bssid: Option<MacAddress>,
    pub channel: u8,
}

pub type ScanTable = heapless::Vec<ScanEntry, WL_NETWORKS_LIST_MAXNUM>;

/// Returned to the driver after each reported BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Number identifying one scan request.
pub type ScanId = u32;

struct Staged {
    scan: ScanId,
    table: ScanTable,
}

/// Table under construction, written from the driver context.
///
/// Each scan is tagged with the [`ScanId`] handed out by [`ScanStaging::begin`].
/// Results and completions quoting any other id belong to a scan the
/// controller already gave up on and are dropped.
pub struct ScanStaging {
    staged: Mutex<RefCell<Staged>>,
    complete: AtomicBool,
}

impl ScanStaging {
    pub fn new() -> Self {
        Self {
            staged: Mutex::new(RefCell::new(Staged {
                scan: 0,
                table: ScanTable::new(),
            })),
            complete: AtomicBool::new(false),
        }
    }

    /// Start a fresh table for a new scan.
    ///
    /// # Returns
    /// The id the driver must quote with every result of this scan.
    pub fn begin(&self) -> ScanId {
        critical_section::with(|cs| {
            let mut staged = self.staged.borrow_ref_mut(cs);
            staged.scan = staged.scan.wrapping_add(1);
            staged.table.clear();
            self.complete.store(false, Ordering::Release);
            staged.scan
        })
    }

    /// Record one BSS reported for `scan`.
    ///
    /// # Arguments
    /// * `scan` - Id of the scan the driver is reporting for
    /// * `entry` - The BSS as seen by the driver
    ///
    /// # Returns
    /// [`ScanControl::Stop`] once the table is full or when `scan` is stale.
    pub fn push(&self, scan: ScanId, entry: ScanEntry) -> ScanControl {
        critical_section::with(|cs| {
            let mut staged = self.staged.borrow_ref_mut(cs);
            if staged.scan != scan {
                return ScanControl::Stop;
            }
            let table = &mut staged.table;
            let seen = table
                .iter()
                .any(|e| e.ssid == entry.ssid && e.bssid == entry.bssid);
            if !seen && table.push(entry).is_err() {
                return ScanControl::Stop;
            }
            if table.is_full() {
                ScanControl::Stop
            } else {
                ScanControl::Continue
            }
        })
    }

    /// Mark `scan` finished. Ignored unless `scan` is the current scan.
    pub fn complete(&self, scan: ScanId) {
        critical_section::with(|cs| {
            if self.staged.borrow_ref(cs).scan == scan {
                self.complete.store(true, Ordering::Release);
            }
        });
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Move the staged entries out, leaving the staging table empty.
    pub fn take(&self) -> ScanTable {
        critical_section::with(|cs| core::mem::take(&mut self.staged.borrow_ref_mut(cs).table))
    }
}

impl Default for ScanStaging {
    fn default() -> Self {
        Self::new()
    }
}

/// Published scan results, owned by the controller.
#[derive(Debug, Default)]
pub struct ScanCache {
    /// Entries of the last completed scan, in discovery order.
    table: ScanTable,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the published table. Called when a new scan starts.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Replace the published table with a completed scan.
    pub fn publish(&mut self, table: ScanTable) {
        self.table = table;
    }

    /// Number of networks in the published table.
    pub fn count(&self) -> u8 {
        // WL_NETWORKS_LIST_MAXNUM fits in a u8
        self.table.len() as u8
    }

    pub fn entry(&self, index: u8) -> Option<&ScanEntry> {
        self.table.get(usize::from(index))
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.table
    }

    /// SSID of the network at `index`.
    ///
    /// # Returns
    /// An empty SSID when `index` is out of range.
    pub fn ssid(&self, index: u8) -> Ssid {
        self.entry(index).map(|e| e.ssid.clone()).unwrap_or_default()
    }

    /// RSSI in dBm, or 0 when `index` is out of range.
    pub fn rssi(&self, index: u8) -> i32 {
        self.entry(index).map_or(0, |e| e.rssi)
    }

    /// Legacy encryption code of the network at `index`.
    ///
    /// # Returns
    /// [`EncType::Unknown`] when `index` is out of range.
    pub fn enc_type(&self, index: u8) -> EncType {
        self.entry(index)
            .map_or(EncType::Unknown, |e| e.security.enc_type())
    }

    /// Full security bitset, or [`Security::UNKNOWN`] when out of range.
    pub fn enc_type_ex(&self, index: u8) -> Security {
        self.entry(index).map_or(Security::UNKNOWN, |e| e.security)
    }

    /// BSSID of the network at `index`, when the driver reported one.
    pub fn bssid(&self, index: u8) -> Option<MacAddress> {
        self.entry(index).and_then(|e| e.bssid)
    }
}

/// Prints the published scan table.
///
/// ```text
/// #   SSID                             RSSI      SECURITY
/// ---------------------------------------------------------------
/// 0   alpha                             -50 ████ WPA2/CCMP
/// 1   beta                              -70 ██░░ open
/// ```
pub fn display_networks(entries: &[ScanEntry]) {
    if entries.is_empty() {
        println!("No networks found.");
        return;
    }

    println!("{:<3} {:<32} {:>5}      {}", "#", "SSID", "RSSI", "SECURITY");
    println!("{}", "-".repeat(63));

    for (index, entry) in entries.iter().enumerate() {
        println!(
            "{:<3} {:<32} {:>5} {} {}",
            index,
            truncate_ssid(&entry.ssid.to_string(), 32),
            entry.rssi,
            rssi_to_bar(entry.rssi),
            entry.security.enc_type()
        );
    }
}

fn truncate_ssid(ssid: &str, max_len: usize) -> String {
    if ssid.chars().count() > max_len {
        let head: String = ssid.chars().take(max_len - 3).collect();
        format!("{}...", head)
    } else {
        ssid.to_string()
    }
}

/// Four-segment signal bar for a dBm reading.
fn rssi_to_bar(rssi: i32) -> &'static str {
    match rssi {
        -55.. => "████",
        -65..=-56 => "███░",
        -75..=-66 => "██░░",
        -85..=-76 => "█░░░",
        _ => "░░░░",
    }
}
