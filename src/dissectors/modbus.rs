//! Modbus/TCP dissector
//!
//! Parses the 7-byte MBAP header followed by the PDU. The function code is
//! PDU byte 0; a starting address is read from PDU bytes 1-2 whenever the
//! PDU is long enough, and the written value from bytes 3-4 for single
//! register writes.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::core::{OtFrame, Protocol};

/// MBAP header: transaction id, protocol id, length, unit id.
pub const MBAP_HEADER_LEN: usize = 7;

/// Function codes that modify coil or register state.
pub const WRITE_FUNCTIONS: &[u8] = &[5, 6, 15, 16];

const FUNC_WRITE_SINGLE_REGISTER: u8 = 6;

pub fn dissect(
    payload: &[u8],
    src_ip: IpAddr,
    dst_ip: IpAddr,
    timestamp: DateTime<Utc>,
) -> Option<OtFrame> {
    if payload.len() < MBAP_HEADER_LEN + 1 {
        return None;
    }
    let pdu = &payload[MBAP_HEADER_LEN..];
    let func = pdu[0];

    let addr = if pdu.len() >= 3 {
        Some(u16::from_be_bytes([pdu[1], pdu[2]]) as u32)
    } else {
        None
    };
    let value = if func == FUNC_WRITE_SINGLE_REGISTER && pdu.len() >= 5 {
        Some(u16::from_be_bytes([pdu[3], pdu[4]]).to_string())
    } else {
        None
    };

    OtFrame::new(
        Protocol::Modbus,
        src_ip,
        dst_ip,
        func.to_string(),
        addr,
        value,
        timestamp,
    )
    .ok()
}
