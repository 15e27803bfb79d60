//! Anomaly rules
//!
//! Each rule inspects one frame against the shared tracking state and
//! yields at most one alert. Rules run in a fixed order per frame, sorted
//! once by (priority, name), and are independent: no rule sees another
//! rule's output for the same frame. A panicking rule is isolated and
//! logged; the remaining rules still run.

pub mod new_master;
pub mod off_schedule_write;
pub mod out_of_range_value;
pub mod unauthorized_zonal_flow;
pub mod unknown_function_code;

pub use new_master::NewMaster;
pub use off_schedule_write::OffScheduleWrite;
pub use out_of_range_value::OutOfRangeValue;
pub use unauthorized_zonal_flow::UnauthorizedZonalFlow;
pub use unknown_function_code::UnknownFunctionCode;

use std::collections::HashSet;
use std::net::IpAddr;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::baseline::Baseline;
use crate::core::{Alert, OtFrame};
use crate::tracker::AssetTracker;
use crate::zones::ZoneRegistry;

/// State a rule may consult while judging one frame. The tracker has
/// already ingested the frame by the time rules run.
pub struct RuleContext<'a> {
    pub tracker: &'a AssetTracker,
    pub known_masters: &'a mut HashSet<IpAddr>,
    pub baseline: &'a Baseline,
    pub zones: &'a ZoneRegistry,
}

/// One anomaly detection rule.
pub trait AnomalyRule: Send + Sync {
    /// Stable rule name, carried in every alert it raises.
    fn name(&self) -> &'static str;

    /// Evaluation order; lower runs earlier. Ties break on name.
    fn priority(&self) -> u32;

    fn evaluate(&self, frame: &OtFrame, ctx: &mut RuleContext<'_>) -> Option<Alert>;
}

/// The rule collection, held in evaluation order.
pub struct RuleSet {
    rules: Vec<Box<dyn AnomalyRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet { rules: Vec::new() }
    }

    /// The built-in rule set.
    pub fn with_builtins() -> Self {
        let mut set = Self::new();
        set.register(Box::new(NewMaster));
        set.register(Box::new(UnknownFunctionCode));
        set.register(Box::new(OffScheduleWrite));
        set.register(Box::new(OutOfRangeValue));
        set.register(Box::new(UnauthorizedZonalFlow));
        set
    }

    /// Adds a rule, keeping the set sorted by (priority, name).
    pub fn register(&mut self, rule: Box<dyn AnomalyRule>) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
    }

    /// Runs every rule against the frame, collecting alerts in rule
    /// order. A rule that panics is skipped with an error log so one bad
    /// rule cannot take down the pipeline.
    pub fn evaluate_all(&self, frame: &OtFrame, ctx: &mut RuleContext<'_>) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for rule in &self.rules {
            match panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(frame, ctx))) {
                Ok(Some(alert)) => alerts.push(alert),
                Ok(None) => {}
                Err(_) => {
                    error!("Rule '{}' panicked during evaluation; skipping", rule.name());
                }
            }
        }
        alerts
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Protocol, Severity};
    use chrono::Utc;

    struct Panicking;

    impl AnomalyRule for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn priority(&self) -> u32 {
            1
        }
        fn evaluate(&self, _frame: &OtFrame, _ctx: &mut RuleContext<'_>) -> Option<Alert> {
            panic!("boom");
        }
    }

    fn sample_frame() -> OtFrame {
        OtFrame::new(
            Protocol::Modbus,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            "3",
            None,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn builtins_are_sorted_by_priority() {
        let set = RuleSet::with_builtins();
        assert_eq!(
            set.names(),
            vec![
                "new_master",
                "unknown_function_code",
                "off_schedule_write",
                "out_of_range_value",
                "unauthorized_zonal_flow",
            ]
        );
    }

    #[test]
    fn registration_order_does_not_matter() {
        let mut set = RuleSet::new();
        set.register(Box::new(UnauthorizedZonalFlow));
        set.register(Box::new(NewMaster));
        assert_eq!(set.names(), vec!["new_master", "unauthorized_zonal_flow"]);
    }

    #[test]
    fn a_panicking_rule_does_not_stop_the_others() {
        let mut set = RuleSet::new();
        set.register(Box::new(Panicking));
        set.register(Box::new(NewMaster));

        let tracker = AssetTracker::new();
        let mut masters = HashSet::new();
        let baseline = Baseline::default();
        let zones = ZoneRegistry::default();
        let mut ctx = RuleContext {
            tracker: &tracker,
            known_masters: &mut masters,
            baseline: &baseline,
            zones: &zones,
        };

        let alerts = set.evaluate_all(&sample_frame(), &mut ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule, "new_master");
        assert_eq!(alerts[0].severity, Severity::Low);
    }
}
