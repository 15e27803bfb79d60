//! Shared helpers for unit tests.

use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};

use crate::baseline::Baseline;
use crate::core::{OtFrame, Protocol};
use crate::tracker::AssetTracker;
use crate::zones::ZoneRegistry;

/// Fixed reference instant so timing assertions are deterministic.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn frame(protocol: Protocol, src: &str, dst: &str, func: &str) -> OtFrame {
    frame_at(protocol, src, dst, func, t0())
}

pub fn frame_at(
    protocol: Protocol,
    src: &str,
    dst: &str,
    func: &str,
    ts: DateTime<Utc>,
) -> OtFrame {
    OtFrame::new(protocol, ip(src), ip(dst), func, None, None, ts).unwrap()
}

/// Empty state for driving a rule in isolation.
pub fn empty_context_parts() -> (AssetTracker, HashSet<IpAddr>, Baseline, ZoneRegistry) {
    (
        AssetTracker::new(),
        HashSet::new(),
        Baseline::default(),
        ZoneRegistry::default(),
    )
}
