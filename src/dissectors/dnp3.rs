//! DNP3 dissector
//!
//! Link-layer aware only to the extent of pulling an application function
//! indicator out of the second byte. No fragment reassembly.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::core::{OtFrame, Protocol};

pub fn dissect(
    payload: &[u8],
    src_ip: IpAddr,
    dst_ip: IpAddr,
    timestamp: DateTime<Utc>,
) -> Option<OtFrame> {
    if payload.len() < 2 {
        return None;
    }
    let func = payload[1];
    OtFrame::new(
        Protocol::Dnp3,
        src_ip,
        dst_ip,
        func.to_string(),
        None,
        None,
        timestamp,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn function_indicator_comes_from_second_byte() {
        let frame = dissect(&[0x05, 0x64, 0x0b], ip("10.1.0.1"), ip("10.1.0.2"), Utc::now())
            .unwrap();
        assert_eq!(frame.protocol, Protocol::Dnp3);
        assert_eq!(frame.func_code, "100");
        assert_eq!(frame.addr, None);
    }

    #[test]
    fn single_byte_payload_is_skipped() {
        assert!(dissect(&[0x05], ip("10.1.0.1"), ip("10.1.0.2"), Utc::now()).is_none());
    }
}
