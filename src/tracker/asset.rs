//! Asset records and role inference
//!
//! An asset is anything with a network or link address that has taken part
//! in an OT conversation. Roles are inferred from the protocol and the
//! direction of the exchange; an operator override always wins and an
//! inferred role never displaces one that is already set.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Protocol;
use crate::dissectors::modbus::WRITE_FUNCTIONS;

/// Confidence assigned when an asset is first observed.
pub const INITIAL_CONFIDENCE: f64 = 0.5;

/// Confidence added per observed interaction, saturating at 1.0.
pub const CONFIDENCE_STEP: f64 = 0.02;

/// One tracked device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable identity: the network address when known, else the link
    /// address, else `"unknown"`.
    pub id: String,
    pub net_addr: Option<IpAddr>,
    pub link_addr: Option<String>,
    pub role: Option<String>,
    #[serde(with = "crate::core::frame::iso8601")]
    pub first_seen: DateTime<Utc>,
    #[serde(with = "crate::core::frame::iso8601")]
    pub last_seen: DateTime<Utc>,
    pub confidence: f64,
}

impl Asset {
    pub fn new(net_addr: Option<IpAddr>, link_addr: Option<String>, ts: DateTime<Utc>) -> Self {
        let id = net_addr
            .map(|ip| ip.to_string())
            .or_else(|| link_addr.clone())
            .unwrap_or_else(|| "unknown".to_string());
        Asset {
            id,
            net_addr,
            link_addr,
            role: None,
            first_seen: ts,
            last_seen: ts,
            confidence: INITIAL_CONFIDENCE,
        }
    }

    /// Marks the asset as seen at `ts`.
    pub fn touch(&mut self, ts: DateTime<Utc>) {
        self.last_seen = ts;
    }

    /// One more interaction observed for this asset.
    pub fn bump_confidence(&mut self) {
        self.confidence = (self.confidence + CONFIDENCE_STEP).min(1.0);
    }

    /// Applies role precedence: an override always wins, an inferred role
    /// only fills an empty slot.
    pub fn assign_role(&mut self, inferred: Option<&str>, override_role: Option<&str>) {
        if let Some(role) = override_role {
            self.role = Some(role.to_string());
        } else if let Some(role) = inferred {
            if self.role.is_none() {
                self.role = Some(role.to_string());
            }
        }
    }
}

/// Infers `(client_role, server_role)` for one exchange.
///
/// The initiator of a Modbus write is assumed to be an engineering
/// workstation; a plain read points at an HMI. The responder side of each
/// protocol has a fixed role.
pub fn infer_roles(
    protocol: Protocol,
    func_code: Option<&str>,
) -> (Option<&'static str>, Option<&'static str>) {
    match protocol {
        Protocol::Modbus => {
            let is_write = func_code
                .and_then(|f| f.parse::<u8>().ok())
                .map(|f| WRITE_FUNCTIONS.contains(&f))
                .unwrap_or(false);
            let client = if is_write { "engineering" } else { "hmi" };
            (Some(client), Some("plc"))
        }
        Protocol::Dnp3 => (Some("master"), Some("rtu")),
        Protocol::Iec104 | Protocol::Iec61850 => {
            (Some("control_center"), Some("substation_device"))
        }
    }
}
