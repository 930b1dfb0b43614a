//! Rate table
//!
//! Named probabilities that gate whether an actor performs an action on a
//! given tick.
//!
//! Two owners exist and never share state:
//! - The scenario engine receives a frozen [`RateConfig`] value as part of
//!   its inputs.
//! - The live driver holds a [`LiveRates`] handle that operators can retune
//!   while traffic is flowing. Each tick reads one snapshot.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Rate validation errors
#[derive(Debug, Error, PartialEq)]
pub enum RateError {
    #[error("Rate '{name}' must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

/// Per-tick action probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Probability a selected requester's booking attempt goes through
    pub booking_attempt: f64,
    /// Probability a pending cancellation is actually issued
    pub cancel_attempt: f64,
    /// Probability a selected actor opens a support ticket
    pub support_ticket: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            booking_attempt: 0.9,
            cancel_attempt: 0.5,
            support_ticket: 0.05,
        }
    }
}

impl RateConfig {
    /// Check every rate is a probability
    pub fn validate(&self) -> Result<(), RateError> {
        for (name, value) in self.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(RateError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    fn named(&self) -> [(&'static str, f64); 3] {
        [
            ("booking_attempt", self.booking_attempt),
            ("cancel_attempt", self.cancel_attempt),
            ("support_ticket", self.support_ticket),
        ]
    }

    /// Apply a partial update, returning the new table
    pub fn with_update(&self, update: &RateUpdate) -> RateConfig {
        RateConfig {
            booking_attempt: update.booking_attempt.unwrap_or(self.booking_attempt),
            cancel_attempt: update.cancel_attempt.unwrap_or(self.cancel_attempt),
            support_ticket: update.support_ticket.unwrap_or(self.support_ticket),
        }
    }
}

/// Partial rate change for live tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateUpdate {
    pub booking_attempt: Option<f64>,
    pub cancel_attempt: Option<f64>,
    pub support_ticket: Option<f64>,
}

/// Mutable rate table owned by the live driver
///
/// Cloning shares the same underlying table.
#[derive(Debug, Clone, Default)]
pub struct LiveRates {
    inner: Arc<RwLock<RateConfig>>,
}

impl LiveRates {
    pub fn new(initial: RateConfig) -> Result<Self, RateError> {
        initial.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(initial)),
        })
    }

    /// Current rates, copied out
    pub fn snapshot(&self) -> RateConfig {
        *self.inner.read()
    }

    /// Apply a partial update; rejected updates leave the table unchanged
    pub fn update(&self, update: &RateUpdate) -> Result<RateConfig, RateError> {
        let mut guard = self.inner.write();
        let next = guard.with_update(update);
        next.validate()?;
        *guard = next;
        tracing::info!(
            booking_attempt = next.booking_attempt,
            cancel_attempt = next.cancel_attempt,
            support_ticket = next.support_ticket,
            "live rates updated"
        );
        Ok(next)
    }
}
