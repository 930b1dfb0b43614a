//! PyO3 bindings
//!
//! Payloads cross the boundary as JSON strings in the same camelCase
//! shapes the serde types use.

pub mod control;
pub mod types;
