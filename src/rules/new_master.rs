//! First appearance of a polling master

use serde_json::json;

use super::{AnomalyRule, RuleContext};
use crate::core::{Alert, OtFrame, Protocol, Severity};

/// Fires the first time a source address initiates Modbus or DNP3
/// traffic, then remembers it. In a stable plant the set of polling
/// masters is fixed, so a new one is worth a look even at low severity.
pub struct NewMaster;

impl AnomalyRule for NewMaster {
    fn name(&self) -> &'static str {
        "new_master"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn evaluate(&self, frame: &OtFrame, ctx: &mut RuleContext<'_>) -> Option<Alert> {
        if !matches!(frame.protocol, Protocol::Modbus | Protocol::Dnp3) {
            return None;
        }
        if !ctx.known_masters.insert(frame.src_ip) {
            return None;
        }
        Some(
            Alert::new(
                Severity::Low,
                self.name(),
                format!("New master {} communicating with {}", frame.src_ip, frame.dst_ip),
            )
            .with_detail("src", json!(frame.src_ip))
            .with_detail("dst", json!(frame.dst_ip))
            .with_detail("protocol", json!(frame.protocol)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{empty_context_parts, frame};

    #[test]
    fn fires_once_per_source() {
        let (tracker, mut masters, baseline, zones) = empty_context_parts();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let first = frame(Protocol::Modbus, "10.0.0.1", "10.0.0.2", "3");
        let alert = NewMaster.evaluate(&first, &mut ctx).unwrap();
        assert_eq!(alert.rule, "new_master");
        assert_eq!(alert.severity, Severity::Low);
        assert_eq!(
            alert.message,
            "New master 10.0.0.1 communicating with 10.0.0.2"
        );
        assert_eq!(alert.details["protocol"], serde_json::json!("modbus"));

        assert!(NewMaster.evaluate(&first, &mut ctx).is_none());

        // a different destination does not re-trigger for the same source
        let second = frame(Protocol::Modbus, "10.0.0.1", "10.0.0.3", "3");
        assert!(NewMaster.evaluate(&second, &mut ctx).is_none());
    }

    #[test]
    fn ignores_protocols_without_masters() {
        let (tracker, mut masters, baseline, zones) = empty_context_parts();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let f = frame(Protocol::Iec104, "10.0.0.1", "10.0.0.2", "100");
        assert!(NewMaster.evaluate(&f, &mut ctx).is_none());
        assert!(masters.is_empty());
    }
}
