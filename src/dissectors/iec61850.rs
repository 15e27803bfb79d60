//! IEC 61850 MMS dissector
//!
//! MMS runs over TCP/102; any non-empty payload is recorded as an MMS
//! application PDU. GOOSE is layer 2 and not handled here.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::core::{OtFrame, Protocol};

const MMS_FUNC: &str = "mms";

pub fn dissect(
    payload: &[u8],
    src_ip: IpAddr,
    dst_ip: IpAddr,
    timestamp: DateTime<Utc>,
) -> Option<OtFrame> {
    if payload.is_empty() {
        return None;
    }
    OtFrame::new(
        Protocol::Iec61850,
        src_ip,
        dst_ip,
        MMS_FUNC,
        None,
        None,
        timestamp,
    )
    .ok()
}
