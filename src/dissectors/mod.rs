//! Protocol dissectors
//!
//! Each dissector takes a TCP payload plus endpoint addresses and yields a
//! normalized [`OtFrame`], or `None` when the payload is not a well formed
//! message for that protocol. Dissectors never fail loudly; a malformed
//! payload is simply skipped.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::core::{OtFrame, Protocol};

pub mod dnp3;
pub mod iec104;
pub mod iec61850;
pub mod modbus;

pub const MODBUS_PORT: u16 = 502;
pub const DNP3_PORT: u16 = 20000;
pub const IEC104_PORT: u16 = 2404;
pub const MMS_PORT: u16 = 102;

/// Maps a well-known TCP port to the protocol spoken on it.
pub fn protocol_for_port(port: u16) -> Option<Protocol> {
    match port {
        MODBUS_PORT => Some(Protocol::Modbus),
        DNP3_PORT => Some(Protocol::Dnp3),
        IEC104_PORT => Some(Protocol::Iec104),
        MMS_PORT => Some(Protocol::Iec61850),
        _ => None,
    }
}

/// Dispatches a payload to the dissector for `protocol`.
pub fn dissect(
    protocol: Protocol,
    payload: &[u8],
    src_ip: IpAddr,
    dst_ip: IpAddr,
    timestamp: DateTime<Utc>,
) -> Option<OtFrame> {
    match protocol {
        Protocol::Modbus => modbus::dissect(payload, src_ip, dst_ip, timestamp),
        Protocol::Dnp3 => dnp3::dissect(payload, src_ip, dst_ip, timestamp),
        Protocol::Iec104 => iec104::dissect(payload, src_ip, dst_ip, timestamp),
        Protocol::Iec61850 => iec61850::dissect(payload, src_ip, dst_ip, timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ports_map_to_protocols() {
        assert_eq!(protocol_for_port(502), Some(Protocol::Modbus));
        assert_eq!(protocol_for_port(20000), Some(Protocol::Dnp3));
        assert_eq!(protocol_for_port(2404), Some(Protocol::Iec104));
        assert_eq!(protocol_for_port(102), Some(Protocol::Iec61850));
        assert_eq!(protocol_for_port(8080), None);
    }
}
