//! Event sinks
//!
//! Frames and alerts leave the process as JSON lines through a sink.
//! The sink target comes from config as a tagged enum; opening resolves
//! it to a concrete writer. Write failures surface as errors so the
//! safety layer can buffer and retry instead of losing documents.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sink destination as configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkTarget {
    /// JSON lines to standard output.
    Stdout,
    /// JSON lines appended to a file.
    File { path: PathBuf },
}

impl Default for SinkTarget {
    fn default() -> Self {
        SinkTarget::Stdout
    }
}

/// Anything documents can be emitted to, one JSON line per call.
pub trait Emit {
    fn emit(&mut self, doc: &str) -> Result<()>;
}

/// An opened sink.
pub enum EventSink {
    Stdout,
    File { path: PathBuf, file: File },
}

impl EventSink {
    /// Resolves a configured target to an opened sink. File targets are
    /// opened for append so restarts extend the stream.
    pub fn open(target: SinkTarget) -> Result<Self> {
        match target {
            SinkTarget::Stdout => Ok(EventSink::Stdout),
            SinkTarget::File { path } => {
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                Ok(EventSink::File { path, file })
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            EventSink::Stdout => "stdout".to_string(),
            EventSink::File { path, .. } => path.display().to_string(),
        }
    }
}

impl Emit for EventSink {
    fn emit(&mut self, doc: &str) -> Result<()> {
        match self {
            EventSink::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{}", doc)?;
                out.flush()?;
            }
            EventSink::File { file, .. } => {
                writeln!(file, "{}", doc)?;
                file.flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn file_sink_appends_json_lines() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let target = SinkTarget::File {
            path: tmp.path().to_path_buf(),
        };
        let mut sink = EventSink::open(target).unwrap();
        sink.emit(r#"{"type":"ot_frame","protocol":"modbus"}"#).unwrap();
        sink.emit(r#"{"severity":"low","rule":"new_master"}"#).unwrap();

        let mut content = String::new();
        std::fs::File::open(tmp.path())
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ot_frame"));
        assert!(lines[1].contains("new_master"));
    }

    #[test]
    fn reopening_extends_the_stream() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let target = SinkTarget::File {
            path: tmp.path().to_path_buf(),
        };
        {
            let mut sink = EventSink::open(target.clone()).unwrap();
            sink.emit("first").unwrap();
        }
        {
            let mut sink = EventSink::open(target).unwrap();
            sink.emit("second").unwrap();
        }

        let content = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn target_parses_from_tagged_toml() {
        let target: SinkTarget = toml::from_str("type = \"stdout\"").unwrap();
        assert_eq!(target, SinkTarget::Stdout);

        let target: SinkTarget =
            toml::from_str("type = \"file\"\npath = \"/var/log/otwatch.jsonl\"").unwrap();
        assert_eq!(
            target,
            SinkTarget::File {
                path: PathBuf::from("/var/log/otwatch.jsonl")
            }
        );
    }
}
