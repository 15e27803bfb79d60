//! Per-flow statistics
//!
//! A flow is the directed (src, dst, protocol) triple. For each flow the
//! tracker accumulates the function codes and register addresses seen plus a
//! bounded buffer of observation timestamps used to derive the flow's
//! typical polling period.

use std::collections::{BTreeSet, VecDeque};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Protocol;

/// Number of observation timestamps retained per flow. When the buffer is
/// full the oldest entry is evicted.
pub const TIMESTAMP_BUFFER: usize = 1000;

/// Directed flow identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: Protocol,
}

impl FlowKey {
    pub fn new(src: IpAddr, dst: IpAddr, protocol: Protocol) -> Self {
        FlowKey { src, dst, protocol }
    }
}

/// Accumulated observations for one flow.
#[derive(Debug, Clone, Default)]
pub struct FlowStats {
    function_codes: BTreeSet<String>,
    addresses: BTreeSet<u32>,
    timestamps: VecDeque<DateTime<Utc>>,
}

impl FlowStats {
    /// Records one observation. Empty function codes are not indexed.
    pub fn record(&mut self, func_code: Option<&str>, addr: Option<u32>, ts: DateTime<Utc>) {
        if let Some(func) = func_code {
            if !func.is_empty() {
                self.function_codes.insert(func.to_string());
            }
        }
        if let Some(addr) = addr {
            self.addresses.insert(addr);
        }
        if self.timestamps.len() == TIMESTAMP_BUFFER {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(ts);
    }

    /// Median of the positive inter-arrival gaps, in seconds.
    ///
    /// Returns `None` until at least three observations are buffered or when
    /// every gap is zero or negative (bursts, clock skew). With an even
    /// number of gaps the upper middle element is taken.
    pub fn typical_period(&self) -> Option<f64> {
        if self.timestamps.len() < 3 {
            return None;
        }
        let mut deltas: Vec<i64> = self
            .timestamps
            .iter()
            .zip(self.timestamps.iter().skip(1))
            .map(|(a, b)| (*b - *a).num_milliseconds())
            .filter(|d| *d > 0)
            .collect();
        if deltas.is_empty() {
            return None;
        }
        deltas.sort_unstable();
        Some(deltas[deltas.len() / 2] as f64 / 1000.0)
    }

    /// Newest buffered observation time.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }

    /// Second newest buffered observation time, i.e. the observation before
    /// the one recorded last.
    pub fn previous_seen(&self) -> Option<DateTime<Utc>> {
        self.timestamps.iter().rev().nth(1).copied()
    }

    /// Number of buffered observations (bounded by [`TIMESTAMP_BUFFER`]).
    pub fn observations(&self) -> usize {
        self.timestamps.len()
    }

    /// Distinct function codes seen, lexicographically ordered.
    pub fn function_codes(&self) -> &BTreeSet<String> {
        &self.function_codes
    }

    /// Distinct register addresses seen, numerically ordered.
    pub fn addresses(&self) -> &BTreeSet<u32> {
        &self.addresses
    }
}
