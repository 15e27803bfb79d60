//! Segmentation policy export
//!
//! Renders the learned flow picture as a policy document an operator can
//! review and hand to a firewall: one entry per observed flow with its
//! function codes, contiguous address ranges and typical polling period.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FlowBaseline;
use crate::core::Protocol;

/// Format version written into every exported document.
pub const POLICY_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub version: u32,
    #[serde(with = "crate::core::frame::iso8601")]
    pub generated_at: DateTime<Utc>,
    pub flows: Vec<PolicyFlow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFlow {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: Protocol,
    pub function_codes: Vec<String>,
    pub address_ranges: Vec<AddressRange>,
    pub typical_period: Option<f64>,
}

/// Inclusive range of register addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: u32,
    pub end: u32,
}

impl PolicyDocument {
    /// Builds the document from baseline rows, compressing each row's
    /// address list into contiguous ranges.
    pub fn from_baseline(rows: Vec<FlowBaseline>) -> Self {
        let flows = rows
            .into_iter()
            .map(|row| PolicyFlow {
                src: row.src,
                dst: row.dst,
                protocol: row.protocol,
                address_ranges: compress_ranges(&row.addresses),
                function_codes: row.function_codes,
                typical_period: row.typical_period,
            })
            .collect();
        PolicyDocument {
            version: POLICY_VERSION,
            generated_at: Utc::now(),
            flows,
        }
    }
}

/// Collapses a sorted address list into inclusive contiguous ranges.
///
/// `[1, 2, 3, 10, 11, 40]` becomes `[1-3, 10-11, 40-40]`.
pub fn compress_ranges(addrs: &[u32]) -> Vec<AddressRange> {
    let mut ranges: Vec<AddressRange> = Vec::new();
    for &addr in addrs {
        match ranges.last_mut() {
            Some(range) if addr == range.end + 1 => range.end = addr,
            Some(range) if addr <= range.end => {}
            _ => ranges.push(AddressRange {
                start: addr,
                end: addr,
            }),
        }
    }
    ranges
}
