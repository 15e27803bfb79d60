//! Network zone registry
//!
//! Zones model the plant's segmentation: named groups of CIDR networks
//! plus an allow-list of (source zone, destination zone) pairs. Zone
//! membership is resolved by declaration order, first match wins, so an
//! operator can put carve-outs ahead of broader networks.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One named zone with its member networks.
#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub networks: Vec<IpNetwork>,
}

impl Zone {
    pub fn contains_ip(&self, ip: &IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(*ip))
    }
}

/// Zone definition as it appears in the zones file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDef {
    pub name: String,
    #[serde(default)]
    pub cidrs: Vec<String>,
}

/// One permitted inter-zone flow direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedFlow {
    pub src_zone: String,
    pub dst_zone: String,
}

#[derive(Debug, Default, Deserialize)]
struct ZoneDoc {
    #[serde(default)]
    zones: Vec<ZoneDef>,
    #[serde(default)]
    allowed_flows: Vec<AllowedFlow>,
}

/// Ordered zone list plus the inter-zone allow-list.
///
/// An empty registry resolves every address to no zone, which disables
/// zonal checks entirely.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
    allowed: HashSet<(String, String)>,
}

impl ZoneRegistry {
    /// Builds a registry from parsed definitions, keeping declaration
    /// order. CIDRs that fail to parse are skipped with a warning.
    pub fn new(defs: Vec<ZoneDef>, allowed: Vec<AllowedFlow>) -> Self {
        let zones = defs
            .into_iter()
            .map(|def| {
                let networks = def
                    .cidrs
                    .iter()
                    .filter_map(|cidr| match cidr.parse::<IpNetwork>() {
                        Ok(net) => Some(net),
                        Err(e) => {
                            warn!("Skipping invalid CIDR '{}' in zone '{}': {}", cidr, def.name, e);
                            None
                        }
                    })
                    .collect();
                Zone {
                    name: def.name,
                    networks,
                }
            })
            .collect();
        let allowed = allowed
            .into_iter()
            .map(|flow| (flow.src_zone, flow.dst_zone))
            .collect();
        ZoneRegistry { zones, allowed }
    }

    /// Loads zone definitions from a YAML or JSON file, chosen by
    /// extension.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read zones file: {}", path.display()))?;
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        let doc: ZoneDoc = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML zones file: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON zones file: {}", path.display()))?
        };

        let registry = Self::new(doc.zones, doc.allowed_flows);
        info!(
            "Loaded {} zones and {} allowed flows from {}",
            registry.zones.len(),
            registry.allowed.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Resolves an address to its zone: the first declared zone containing
    /// the address wins.
    pub fn zone_of(&self, ip: &IpAddr) -> Option<&str> {
        self.zones
            .iter()
            .find(|zone| zone.contains_ip(ip))
            .map(|zone| zone.name.as_str())
    }

    pub fn is_allowed(&self, src_zone: &str, dst_zone: &str) -> bool {
        self.allowed
            .iter()
            .any(|(src, dst)| src == src_zone && dst == dst_zone)
    }

    /// Adds one permitted flow direction.
    pub fn allow(&mut self, src_zone: impl Into<String>, dst_zone: impl Into<String>) {
        self.allowed.insert((src_zone.into(), dst_zone.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }
}
