//! Deployment safety controls
//!
//! A passive monitor must stay harmless even when the plant is having a
//! bad day. Three controls sit between the pipeline and the sink:
//!
//! - [`KillSwitch`]: an environment flag silences all emission at once
//! - [`BufferedEmitter`]: documents survive a sink outage in a bounded
//!   FIFO and drain once writes succeed again
//! - [`AlertRamp`]: alerts are downgraded to `warn` during the first days
//!   of a deployment while the baseline is still settling

use std::collections::VecDeque;
use std::env;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, warn};

use crate::core::Severity;
use crate::sink::Emit;

/// Environment variable that suppresses all emission when set to `1`,
/// `true` or `yes` (case-insensitive).
pub const KILL_SWITCH_ENV: &str = "OTWATCH_DISABLED";

/// Default capacity of the emission buffer.
pub const EMIT_BUFFER_CAPACITY: usize = 10_000;

/// Emission kill switch, consulted before every write.
pub struct KillSwitch {
    check: Box<dyn Fn() -> bool + Send>,
}

impl KillSwitch {
    /// Reads [`KILL_SWITCH_ENV`] on every check, so flipping the variable
    /// takes effect without a restart.
    pub fn from_env() -> Self {
        Self::with_check(|| {
            env::var(KILL_SWITCH_ENV)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        })
    }

    /// Custom predicate, mainly for tests.
    pub fn with_check(check: impl Fn() -> bool + Send + 'static) -> Self {
        KillSwitch {
            check: Box::new(check),
        }
    }

    pub fn engaged(&self) -> bool {
        (self.check)()
    }
}

/// Wraps a sink with a bounded retry buffer.
///
/// Every emit first drains whatever is buffered, oldest first, so
/// document order is preserved across an outage. When the sink is still
/// down the incoming document is queued; once the buffer is full the
/// incoming document is dropped with an error log.
pub struct BufferedEmitter<S> {
    sink: S,
    buffer: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl<S: Emit> BufferedEmitter<S> {
    pub fn new(sink: S, capacity: usize) -> Self {
        BufferedEmitter {
            sink,
            buffer: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn emit(&mut self, doc: String) {
        self.flush();
        if !self.buffer.is_empty() {
            // still backed up; keep order by queueing behind older docs
            self.push(doc);
            return;
        }
        if let Err(e) = self.sink.emit(&doc) {
            warn!("Sink write failed; buffering document: {}", e);
            self.push(doc);
        }
    }

    /// Retries buffered documents until one fails or the buffer drains.
    pub fn flush(&mut self) {
        while let Some(doc) = self.buffer.front() {
            if self.sink.emit(doc).is_err() {
                break;
            }
            self.buffer.pop_front();
        }
    }

    fn push(&mut self, doc: String) {
        if self.buffer.len() < self.capacity {
            self.buffer.push_back(doc);
        } else {
            self.dropped += 1;
            error!("Emission buffer full ({} docs); dropping document", self.capacity);
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Severity downgrade for a fresh deployment.
///
/// With `ramp_days` zero the ramp is disabled and severities pass
/// through unchanged.
pub struct AlertRamp {
    started_at: DateTime<Utc>,
    ramp_days: u32,
}

impl AlertRamp {
    pub fn new(ramp_days: u32) -> Self {
        Self::starting_at(ramp_days, Utc::now())
    }

    pub fn starting_at(ramp_days: u32, started_at: DateTime<Utc>) -> Self {
        AlertRamp {
            started_at,
            ramp_days,
        }
    }

    /// The severity to emit for an alert the rules rated `base`.
    pub fn severity(&self, base: Severity) -> Severity {
        if self.ramp_days == 0 {
            return base;
        }
        let elapsed = Utc::now() - self.started_at;
        if elapsed < Duration::days(self.ramp_days as i64) {
            Severity::Warn
        } else {
            base
        }
    }

    pub fn active(&self) -> bool {
        self.ramp_days > 0 && Utc::now() - self.started_at < Duration::days(self.ramp_days as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OtwatchError;
    use std::io;

    /// Sink that fails while `down` and records successful writes.
    struct FlakySink {
        down: bool,
        written: Vec<String>,
    }

    impl FlakySink {
        fn new() -> Self {
            FlakySink {
                down: false,
                written: Vec::new(),
            }
        }
    }

    impl Emit for FlakySink {
        fn emit(&mut self, doc: &str) -> crate::error::Result<()> {
            if self.down {
                return Err(OtwatchError::Sink(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "sink down",
                )));
            }
            self.written.push(doc.to_string());
            Ok(())
        }
    }

    #[test]
    fn kill_switch_reads_truthy_values() {
        let on = KillSwitch::with_check(|| true);
        assert!(on.engaged());
        let off = KillSwitch::with_check(|| false);
        assert!(!off.engaged());
    }

    #[test]
    fn outage_buffers_then_drains_in_order() {
        let mut emitter = BufferedEmitter::new(FlakySink::new(), 10);
        emitter.emit("a".to_string());
        assert_eq!(emitter.buffered(), 0);

        emitter.sink.down = true;
        emitter.emit("b".to_string());
        emitter.emit("c".to_string());
        assert_eq!(emitter.buffered(), 2);

        emitter.sink.down = false;
        emitter.emit("d".to_string());
        assert_eq!(emitter.buffered(), 0);
        assert_eq!(emitter.sink.written, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn full_buffer_drops_the_newest() {
        let mut emitter = BufferedEmitter::new(FlakySink::new(), 2);
        emitter.sink.down = true;
        emitter.emit("a".to_string());
        emitter.emit("b".to_string());
        emitter.emit("c".to_string());
        assert_eq!(emitter.buffered(), 2);
        assert_eq!(emitter.dropped(), 1);

        emitter.sink.down = false;
        emitter.flush();
        assert_eq!(emitter.sink.written, vec!["a", "b"]);
    }

    #[test]
    fn ramp_downgrades_until_it_expires() {
        let fresh = AlertRamp::starting_at(3, Utc::now());
        assert!(fresh.active());
        assert_eq!(fresh.severity(Severity::High), Severity::Warn);

        let seasoned = AlertRamp::starting_at(3, Utc::now() - Duration::days(4));
        assert!(!seasoned.active());
        assert_eq!(seasoned.severity(Severity::High), Severity::High);
    }

    #[test]
    fn disabled_ramp_passes_severity_through() {
        let ramp = AlertRamp::new(0);
        assert!(!ramp.active());
        assert_eq!(ramp.severity(Severity::Low), Severity::Low);
    }
}
