//! Modbus write outside the flow's polling rhythm

use serde_json::json;

use super::{AnomalyRule, RuleContext};
use crate::core::{Alert, OtFrame, Protocol, Severity};
use crate::dissectors::modbus::WRITE_FUNCTIONS;
use crate::tracker::FlowKey;

/// Fires when a Modbus write lands on a flow whose traffic is otherwise
/// periodic, and the gap since the previous observation is more than twice
/// the flow's typical period. The tracker records the frame before rules
/// run, so the gap is measured between the two newest buffered
/// observations.
pub struct OffScheduleWrite;

impl AnomalyRule for OffScheduleWrite {
    fn name(&self) -> &'static str {
        "off_schedule_write"
    }

    fn priority(&self) -> u32 {
        30
    }

    fn evaluate(&self, frame: &OtFrame, ctx: &mut RuleContext<'_>) -> Option<Alert> {
        if frame.protocol != Protocol::Modbus {
            return None;
        }
        let func = frame.func_code.parse::<u8>().ok()?;
        if !WRITE_FUNCTIONS.contains(&func) {
            return None;
        }

        let key = FlowKey::new(frame.src_ip, frame.dst_ip, frame.protocol);
        let stats = ctx.tracker.flow_stats(&key)?;
        let period = stats.typical_period()?;
        let previous = stats.previous_seen()?;

        let delta = (frame.timestamp - previous).num_milliseconds() as f64 / 1000.0;
        if delta <= 2.0 * period {
            return None;
        }
        Some(
            Alert::new(Severity::Medium, self.name(), "Off-schedule Modbus write detected")
                .with_detail("src", json!(frame.src_ip))
                .with_detail("dst", json!(frame.dst_ip))
                .with_detail("func", json!(frame.func_code))
                .with_detail("delta_s", json!(delta))
                .with_detail("period_s", json!(period)),
        )
    }
}
