//! Deterministic random number generation
//!
//! Uses xorshift64* for fast, deterministic random number generation.
//! CRITICAL: All randomness in the scenario engine MUST go through this module.

mod xorshift;

pub use xorshift::RngManager;
