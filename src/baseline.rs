//! Learned-baseline documents
//!
//! A baseline maps each (src, dst, protocol) flow to the set of function
//! codes considered normal for it. Documents are produced by the
//! `baseline` subcommand against a training capture and fed back in via
//! the config; the function-code rule only judges flows the baseline
//! actually covers.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::Protocol;
use crate::tracker::FlowKey;

/// One baseline row. Extra fields in the document (addresses, typical
/// period) are ignored, so a policy export loads as a baseline too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRow {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: Protocol,
    #[serde(default)]
    pub function_codes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BaselineDoc {
    #[serde(default)]
    flows: Vec<BaselineRow>,
}

/// Expected function codes per flow.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    flows: HashMap<FlowKey, HashSet<String>>,
}

impl Baseline {
    pub fn from_rows(rows: impl IntoIterator<Item = BaselineRow>) -> Self {
        let mut baseline = Baseline::default();
        for row in rows {
            baseline.insert(row.src, row.dst, row.protocol, row.function_codes);
        }
        baseline
    }

    /// Loads a baseline from a YAML or JSON document, chosen by extension.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read baseline file: {}", path.display()))?;
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        let doc: BaselineDoc = if is_yaml {
            serde_yaml::from_str(&content).with_context(|| {
                format!("Failed to parse YAML baseline file: {}", path.display())
            })?
        } else {
            serde_json::from_str(&content).with_context(|| {
                format!("Failed to parse JSON baseline file: {}", path.display())
            })?
        };

        let baseline = Self::from_rows(doc.flows);
        info!(
            "Loaded baseline for {} flows from {}",
            baseline.len(),
            path.display()
        );
        Ok(baseline)
    }

    /// Merges one row into the baseline. Repeated rows for the same flow
    /// union their function codes.
    pub fn insert(
        &mut self,
        src: IpAddr,
        dst: IpAddr,
        protocol: Protocol,
        function_codes: impl IntoIterator<Item = String>,
    ) {
        self.flows
            .entry(FlowKey::new(src, dst, protocol))
            .or_default()
            .extend(function_codes);
    }

    /// Expected codes for a flow, or `None` when the baseline does not
    /// cover it.
    pub fn function_codes(&self, key: &FlowKey) -> Option<&HashSet<String>> {
        self.flows.get(key)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn key(src: &str, dst: &str) -> FlowKey {
        FlowKey::new(ip(src), ip(dst), Protocol::Modbus)
    }

    #[test]
    fn repeated_rows_union_function_codes() {
        let mut baseline = Baseline::default();
        baseline.insert(ip("10.0.0.1"), ip("10.0.0.2"), Protocol::Modbus, ["3".to_string()]);
        baseline.insert(ip("10.0.0.1"), ip("10.0.0.2"), Protocol::Modbus, ["6".to_string()]);

        let codes = baseline.function_codes(&key("10.0.0.1", "10.0.0.2")).unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("3") && codes.contains("6"));
        assert!(baseline.function_codes(&key("10.0.0.1", "10.0.0.3")).is_none());
    }

    #[test]
    fn loads_policy_shaped_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "flows:\n  - src: 10.0.0.1\n    dst: 10.0.0.2\n    protocol: modbus\n    function_codes: [\"3\", \"4\"]\n    addresses: [100, 101]\n    typical_period: 60.0\n"
        )
        .unwrap();

        let baseline = Baseline::load_file(file.path()).unwrap();
        assert_eq!(baseline.len(), 1);
        let codes = baseline.function_codes(&key("10.0.0.1", "10.0.0.2")).unwrap();
        assert!(codes.contains("4"));
    }

    #[test]
    fn loads_json_document() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            "{}",
            r#"{"flows":[{"src":"10.0.0.5","dst":"10.0.0.6","protocol":"dnp3","function_codes":["1"]}]}"#
        )
        .unwrap();

        let baseline = Baseline::load_file(file.path()).unwrap();
        let key = FlowKey::new(ip("10.0.0.5"), ip("10.0.0.6"), Protocol::Dnp3);
        assert!(baseline.function_codes(&key).unwrap().contains("1"));
    }

    #[test]
    fn malformed_document_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{}", r#"{"flows":[{"src":"not-an-ip"}]}"#).unwrap();
        assert!(Baseline::load_file(file.path()).is_err());
    }
}
