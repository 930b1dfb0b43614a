//! Domain models for the simulation-governance core

pub mod actor;
pub mod envelope;
pub mod state;

// Re-exports
pub use actor::{Actor, ActorKind, Population, PopulationConfig};
pub use envelope::{
    make_event_id, AnalyticsEnvelope, EventEnvelope, SimEvent, StandardizedEvent, Timebase,
    ENVELOPE_VERSION,
};
pub use state::{average_stress, MarketState};
