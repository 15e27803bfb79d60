//! Asset and flow tracker
//!
//! Builds a live inventory of OT devices and a picture of who talks to
//! whom. Every dissected frame passes through [`AssetTracker::ingest`],
//! which resolves both endpoints to assets, infers roles, raises
//! confidence and updates the flow statistics. The accumulated state can
//! be exported as baseline rows or as a segmentation policy document.

pub mod asset;
pub mod flow;
pub mod policy;

pub use asset::{infer_roles, Asset, CONFIDENCE_STEP, INITIAL_CONFIDENCE};
pub use flow::{FlowKey, FlowStats, TIMESTAMP_BUFFER};
pub use policy::{compress_ranges, AddressRange, PolicyDocument, PolicyFlow};

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Protocol;

/// One exported baseline row: a flow with everything learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowBaseline {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: Protocol,
    pub function_codes: Vec<String>,
    pub addresses: Vec<u32>,
    pub typical_period: Option<f64>,
}

/// Inventory of assets plus per-flow statistics.
///
/// Assets live in an arena; the two indices resolve a network or link
/// address to the arena slot, so an asset keyed both ways exists exactly
/// once. The network address index takes precedence on lookup.
#[derive(Debug, Default)]
pub struct AssetTracker {
    assets: Vec<Asset>,
    by_net: HashMap<IpAddr, usize>,
    by_link: HashMap<String, usize>,
    flows: HashMap<FlowKey, FlowStats>,
    overrides: HashMap<String, String>,
}

impl AssetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs operator role overrides, keyed by asset id. An override
    /// is applied on every ingest and beats any inference.
    pub fn load_overrides(&mut self, overrides: HashMap<String, String>) {
        self.overrides = overrides;
    }

    /// Feeds one observed exchange into the tracker.
    ///
    /// Both network addresses must be present; an exchange without them
    /// carries no usable identity and is dropped. Link addresses are
    /// optional and only add a second lookup key.
    #[allow(clippy::too_many_arguments)]
    pub fn ingest(
        &mut self,
        src_link: Option<&str>,
        src_net: Option<IpAddr>,
        dst_link: Option<&str>,
        dst_net: Option<IpAddr>,
        protocol: Protocol,
        func_code: Option<&str>,
        addr: Option<u32>,
        ts: DateTime<Utc>,
    ) {
        let (src_ip, dst_ip) = match (src_net, dst_net) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return,
        };

        let src_idx = self.resolve(src_net, src_link, ts);
        let dst_idx = self.resolve(dst_net, dst_link, ts);

        let (client_role, server_role) = infer_roles(protocol, func_code);
        self.assign_role(src_idx, client_role);
        self.assign_role(dst_idx, server_role);

        self.assets[src_idx].bump_confidence();
        self.assets[dst_idx].bump_confidence();

        self.flows
            .entry(FlowKey::new(src_ip, dst_ip, protocol))
            .or_default()
            .record(func_code, addr, ts);
    }

    /// Finds the asset for an address pair, creating it on first sight.
    fn resolve(&mut self, net: Option<IpAddr>, link: Option<&str>, ts: DateTime<Utc>) -> usize {
        let found = net
            .and_then(|ip| self.by_net.get(&ip).copied())
            .or_else(|| link.and_then(|mac| self.by_link.get(mac).copied()));
        let idx = match found {
            Some(idx) => idx,
            None => {
                let idx = self.assets.len();
                if let Some(ip) = net {
                    self.by_net.insert(ip, idx);
                }
                if let Some(mac) = link {
                    self.by_link.insert(mac.to_string(), idx);
                }
                self.assets.push(Asset::new(net, link.map(str::to_string), ts));
                idx
            }
        };
        self.assets[idx].touch(ts);
        idx
    }

    fn assign_role(&mut self, idx: usize, inferred: Option<&str>) {
        let override_role = self.overrides.get(&self.assets[idx].id).cloned();
        self.assets[idx].assign_role(inferred, override_role.as_deref());
    }

    /// All known assets. The arena holds each asset exactly once, so the
    /// slice is already deduplicated.
    pub fn inventory(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset_by_net(&self, ip: &IpAddr) -> Option<&Asset> {
        self.by_net.get(ip).map(|&idx| &self.assets[idx])
    }

    pub fn asset_by_link(&self, mac: &str) -> Option<&Asset> {
        self.by_link.get(mac).map(|&idx| &self.assets[idx])
    }

    pub fn flow_stats(&self, key: &FlowKey) -> Option<&FlowStats> {
        self.flows.get(key)
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Exports one baseline row per flow, sorted by (src, dst, protocol)
    /// for a deterministic document.
    pub fn baseline(&self) -> Vec<FlowBaseline> {
        let mut rows: Vec<FlowBaseline> = self
            .flows
            .iter()
            .map(|(key, stats)| FlowBaseline {
                src: key.src,
                dst: key.dst,
                protocol: key.protocol,
                function_codes: stats.function_codes().iter().cloned().collect(),
                addresses: stats.addresses().iter().copied().collect(),
                typical_period: stats.typical_period(),
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.src, a.dst, a.protocol).cmp(&(b.src, b.dst, b.protocol))
        });
        rows
    }

    /// Renders the learned flows as a segmentation policy document.
    pub fn policy_document(&self) -> PolicyDocument {
        PolicyDocument::from_baseline(self.baseline())
    }
}
