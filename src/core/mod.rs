//! Core data model shared by every stage of the pipeline.
//!
//! - `frame`: normalized protocol frame produced by the dissectors
//! - `alert`: detection alert emitted by the anomaly rules

pub mod alert;
pub mod frame;

pub use alert::{Alert, Severity};
pub use frame::{OtFrame, Protocol};
