//! IEC 60870-5-104 dissector
//!
//! Treats the first APCI byte as the function indicator. No APDU type
//! discrimination beyond that.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::core::{OtFrame, Protocol};

pub fn dissect(
    payload: &[u8],
    src_ip: IpAddr,
    dst_ip: IpAddr,
    timestamp: DateTime<Utc>,
) -> Option<OtFrame> {
    let func = *payload.first()?;
    OtFrame::new(
        Protocol::Iec104,
        src_ip,
        dst_ip,
        func.to_string(),
        None,
        None,
        timestamp,
    )
    .ok()
}
