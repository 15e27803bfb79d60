//! Tracking agent
//!
//! The agent owns the tracker, the rule set and the learned context
//! (known masters, baseline, zones). Every dissected frame goes through
//! [`TrackingAgent::ingest_frame`]: the tracker absorbs it first, then the
//! rules judge it in priority order against the updated state.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::baseline::Baseline;
use crate::core::{Alert, OtFrame};
use crate::rules::{RuleContext, RuleSet};
use crate::tracker::AssetTracker;
use crate::zones::ZoneRegistry;

pub struct TrackingAgent {
    tracker: AssetTracker,
    rules: RuleSet,
    known_masters: HashSet<IpAddr>,
    baseline: Baseline,
    zones: ZoneRegistry,
}

impl TrackingAgent {
    /// Builds an agent with the built-in rule set.
    pub fn new(zones: ZoneRegistry, baseline: Baseline) -> Self {
        TrackingAgent {
            tracker: AssetTracker::new(),
            rules: RuleSet::with_builtins(),
            known_masters: HashSet::new(),
            baseline,
            zones,
        }
    }

    /// Installs operator role overrides on the tracker.
    pub fn load_role_overrides(&mut self, overrides: HashMap<String, String>) {
        self.tracker.load_overrides(overrides);
    }

    /// Absorbs one frame and returns the alerts it raised, in rule order.
    pub fn ingest_frame(&mut self, frame: &OtFrame) -> Vec<Alert> {
        self.tracker.ingest(
            None,
            Some(frame.src_ip),
            None,
            Some(frame.dst_ip),
            frame.protocol,
            Some(&frame.func_code),
            frame.addr,
            frame.timestamp,
        );

        let mut ctx = RuleContext {
            tracker: &self.tracker,
            known_masters: &mut self.known_masters,
            baseline: &self.baseline,
            zones: &self.zones,
        };
        self.rules.evaluate_all(frame, &mut ctx)
    }

    pub fn tracker(&self) -> &AssetTracker {
        &self.tracker
    }

    pub fn known_master_count(&self) -> usize {
        self.known_masters.len()
    }
}
