pub mod agent;
pub mod baseline;
pub mod capture;
pub mod config;
pub mod core;
pub mod dissectors;
pub mod error;
pub mod rules;
pub mod safety;
pub mod sink;
pub mod tracker;
pub mod zones;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::agent::TrackingAgent;
pub use crate::core::{Alert, OtFrame, Protocol, Severity};
pub use crate::error::{OtwatchError, Result};
