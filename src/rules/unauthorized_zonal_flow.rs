//! Traffic crossing zones without an allow-list entry

use serde_json::json;

use super::{AnomalyRule, RuleContext};
use crate::core::{Alert, OtFrame, Severity};

/// Fires when both endpoints resolve to known, distinct zones and the
/// (src zone, dst zone) direction is not on the allow-list. Endpoints
/// outside every zone are not judged; an empty registry silences the rule
/// completely.
pub struct UnauthorizedZonalFlow;

impl AnomalyRule for UnauthorizedZonalFlow {
    fn name(&self) -> &'static str {
        "unauthorized_zonal_flow"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn evaluate(&self, frame: &OtFrame, ctx: &mut RuleContext<'_>) -> Option<Alert> {
        let src_zone = ctx.zones.zone_of(&frame.src_ip)?;
        let dst_zone = ctx.zones.zone_of(&frame.dst_ip)?;
        if src_zone == dst_zone || ctx.zones.is_allowed(src_zone, dst_zone) {
            return None;
        }
        Some(
            Alert::new(Severity::Medium, self.name(), "Unauthorized zonal flow")
                .with_detail("src_ip", json!(frame.src_ip))
                .with_detail("dst_ip", json!(frame.dst_ip))
                .with_detail("src_zone", json!(src_zone))
                .with_detail("dst_zone", json!(dst_zone)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Protocol;
    use crate::test_support::{empty_context_parts, frame};
    use crate::zones::{ZoneDef, ZoneRegistry};

    fn two_zone_registry() -> ZoneRegistry {
        ZoneRegistry::new(
            vec![
                ZoneDef {
                    name: "control".to_string(),
                    cidrs: vec!["10.0.1.0/24".to_string()],
                },
                ZoneDef {
                    name: "field".to_string(),
                    cidrs: vec!["10.0.2.0/24".to_string()],
                },
            ],
            Vec::new(),
        )
    }

    #[test]
    fn cross_zone_without_permission_fires() {
        let (tracker, mut masters, baseline, _) = empty_context_parts();
        let zones = two_zone_registry();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let f = frame(Protocol::Modbus, "10.0.1.5", "10.0.2.5", "3");
        let alert = UnauthorizedZonalFlow.evaluate(&f, &mut ctx).unwrap();
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.details["src_zone"], serde_json::json!("control"));
        assert_eq!(alert.details["dst_zone"], serde_json::json!("field"));
    }

    #[test]
    fn allow_list_entry_silences_that_direction_only() {
        let (tracker, mut masters, baseline, _) = empty_context_parts();
        let mut zones = two_zone_registry();
        zones.allow("control", "field");
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let forward = frame(Protocol::Modbus, "10.0.1.5", "10.0.2.5", "3");
        assert!(UnauthorizedZonalFlow.evaluate(&forward, &mut ctx).is_none());

        let reverse = frame(Protocol::Modbus, "10.0.2.5", "10.0.1.5", "3");
        assert!(UnauthorizedZonalFlow.evaluate(&reverse, &mut ctx).is_some());
    }

    #[test]
    fn same_zone_and_unzoned_endpoints_pass() {
        let (tracker, mut masters, baseline, _) = empty_context_parts();
        let zones = two_zone_registry();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let same = frame(Protocol::Modbus, "10.0.1.5", "10.0.1.9", "3");
        assert!(UnauthorizedZonalFlow.evaluate(&same, &mut ctx).is_none());

        let unzoned = frame(Protocol::Modbus, "192.168.1.1", "10.0.2.5", "3");
        assert!(UnauthorizedZonalFlow.evaluate(&unzoned, &mut ctx).is_none());
    }
}
