//! Function code outside the learned baseline

use serde_json::json;

use super::{AnomalyRule, RuleContext};
use crate::core::{Alert, OtFrame, Severity};
use crate::tracker::FlowKey;

/// Fires when a baseline covers the frame's flow and the observed
/// function code is not in the recorded set. Flows the baseline never
/// saw are left alone; judging them is the other rules' job.
pub struct UnknownFunctionCode;

impl AnomalyRule for UnknownFunctionCode {
    fn name(&self) -> &'static str {
        "unknown_function_code"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn evaluate(&self, frame: &OtFrame, ctx: &mut RuleContext<'_>) -> Option<Alert> {
        let key = FlowKey::new(frame.src_ip, frame.dst_ip, frame.protocol);
        let expected = ctx.baseline.function_codes(&key)?;
        if expected.contains(&frame.func_code) {
            return None;
        }
        Some(
            Alert::new(Severity::Medium, self.name(), "Unknown function code observed")
                .with_detail("src", json!(frame.src_ip))
                .with_detail("dst", json!(frame.dst_ip))
                .with_detail("protocol", json!(frame.protocol))
                .with_detail("func", json!(frame.func_code)),
        )
    }
}
