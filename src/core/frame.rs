//! Normalized protocol frame
//!
//! Every dissector reduces its protocol to the same flat record so the
//! tracker and rules never see raw payload bytes.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OtwatchError, Result};

/// Wire tag carried in the `type` field of every emitted frame.
pub const FRAME_TYPE: &str = "ot_frame";

/// Industrial protocols the dissectors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Modbus,
    Dnp3,
    Iec104,
    Iec61850,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Modbus => "modbus",
            Protocol::Dnp3 => "dnp3",
            Protocol::Iec104 => "iec104",
            Protocol::Iec61850 => "iec61850",
        }
    }

    pub fn from_name(name: &str) -> Option<Protocol> {
        match name {
            "modbus" => Some(Protocol::Modbus),
            "dnp3" => Some(Protocol::Dnp3),
            "iec104" => Some(Protocol::Iec104),
            "iec61850" => Some(Protocol::Iec61850),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed protocol interaction, normalized across dissectors.
///
/// `func_code` is the protocol operation as a base-10 string (or a
/// symbolic name where the protocol has no numeric code). `addr` and
/// `value` are only present when the dissector could extract them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtFrame {
    pub protocol: Protocol,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub func_code: String,
    pub addr: Option<u32>,
    pub value: Option<String>,
    pub session_id: String,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl OtFrame {
    /// Builds a frame, deriving the session id from the endpoint pair.
    ///
    /// Rejects an empty function code; address and endpoint validity are
    /// enforced by the field types.
    pub fn new(
        protocol: Protocol,
        src_ip: IpAddr,
        dst_ip: IpAddr,
        func_code: impl Into<String>,
        addr: Option<u32>,
        value: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let func_code = func_code.into();
        if func_code.is_empty() {
            return Err(OtwatchError::InvalidFrame(
                "func_code must not be empty".to_string(),
            ));
        }
        let session_id = format!("{}->{}", src_ip, dst_ip);
        Ok(OtFrame {
            protocol,
            src_ip,
            dst_ip,
            func_code,
            addr,
            value,
            session_id,
            timestamp,
        })
    }

    /// Serializes the frame as a single JSON line with the `type` tag first.
    pub fn to_wire(&self) -> Result<String> {
        let wire = WireFrame {
            kind: FRAME_TYPE,
            frame: self,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parses a frame back from its wire form. The `type` tag is ignored.
    pub fn from_wire(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    frame: &'a OtFrame,
}

/// Timestamps on the wire are ISO 8601 with microsecond precision and a
/// `Z` suffix, e.g. `2024-01-15T10:30:00.000000Z`.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
