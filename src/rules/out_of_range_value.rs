//! Written value beyond the plausible physical range

use serde_json::json;

use super::{AnomalyRule, RuleContext};
use crate::core::{Alert, OtFrame, Severity};

/// Placeholder plant-wide limit. Real deployments learn per-point ranges;
/// until then a single ceiling still catches the grossly wrong setpoint.
pub const VALUE_LIMIT: f64 = 400.0;

/// Fires when the frame carries a numeric value above [`VALUE_LIMIT`].
/// Frames without a value, or with a non-numeric one, pass untouched.
pub struct OutOfRangeValue;

impl AnomalyRule for OutOfRangeValue {
    fn name(&self) -> &'static str {
        "out_of_range_value"
    }

    fn priority(&self) -> u32 {
        40
    }

    fn evaluate(&self, frame: &OtFrame, _ctx: &mut RuleContext<'_>) -> Option<Alert> {
        let value: f64 = frame.value.as_deref()?.parse().ok()?;
        if value <= VALUE_LIMIT {
            return None;
        }
        Some(
            Alert::new(Severity::High, self.name(), "Out-of-range value detected")
                .with_detail("dst", json!(frame.dst_ip))
                .with_detail("addr", json!(frame.addr))
                .with_detail("value", json!(value)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Protocol;
    use crate::test_support::{empty_context_parts, ip, t0};

    fn write_frame(value: Option<&str>) -> OtFrame {
        OtFrame::new(
            Protocol::Modbus,
            ip("10.0.0.1"),
            ip("10.0.0.2"),
            "6",
            Some(100),
            value.map(str::to_string),
            t0(),
        )
        .unwrap()
    }

    #[test]
    fn value_above_limit_fires() {
        let (tracker, mut masters, baseline, zones) = empty_context_parts();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let alert = OutOfRangeValue
            .evaluate(&write_frame(Some("1234")), &mut ctx)
            .unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.details["addr"], serde_json::json!(100));
        assert_eq!(alert.details["value"], serde_json::json!(1234.0));
    }

    #[test]
    fn limit_is_exclusive() {
        let (tracker, mut masters, baseline, zones) = empty_context_parts();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        assert!(OutOfRangeValue
            .evaluate(&write_frame(Some("400")), &mut ctx)
            .is_none());
        assert!(OutOfRangeValue
            .evaluate(&write_frame(Some("400.5")), &mut ctx)
            .is_some());
    }

    #[test]
    fn missing_or_non_numeric_values_pass() {
        let (tracker, mut masters, baseline, zones) = empty_context_parts();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        assert!(OutOfRangeValue.evaluate(&write_frame(None), &mut ctx).is_none());
        assert!(OutOfRangeValue
            .evaluate(&write_frame(Some("mms-data")), &mut ctx)
            .is_none());
    }
}
