//! Deterministic scenario engine
//!
//! Produces an ordered, reproducible stream of [`EventEnvelope`]s plus one
//! [`MarketState`] per tick from `(scenario, registry, seed, horizon)`.
//!
//! # Determinism
//!
//! All randomness flows from one [`RngManager`] built by
//! [`RngManager::mixed`] from the scenario seed and the run seed; each actor
//! model draws from a fork labelled with its role and the tick, so adding a
//! draw to one model never shifts another model's stream. Nothing reads the
//! wall clock or live rates.
//!
//! # Tick order
//!
//! 1. Requester model: demand, cancellations, no-shows, retries and the
//!    booking / cancellation / support events gated by the rate table
//! 2. Provider model: availability and a `provider.updated` event
//! 3. System model: stress, queue depth, utilization, latency sample,
//!    anomaly / trust-violation / booking-failure events
//!
//! Event ids derive from `(seed, tick, domain, type, ordinal-within-tick)`.

use super::profile::HistoricalProfile;
use super::{Scenario, ScenarioError, Shocks, SimulationConfig};
use crate::core::time::LogicalClock;
use crate::governance::registry::{check_registry, DomainRegistry};
use crate::models::{ActorKind, EventEnvelope, MarketState, Population};
use crate::rates::RateConfig;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Every domain the engine can emit
pub const ENGINE_DOMAINS: [&str; 5] = ["booking", "provider", "ops", "trust_safety", "support"];

/// Upper bound on booking attempts generated per tick
pub const MAX_ATTEMPTS_PER_TICK: u32 = 8;

const ANOMALY_THRESHOLD: f64 = 0.6;
const TRUST_VIOLATION_THRESHOLD: f64 = 0.85;

/// Result of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub run_id: String,
    pub seed: u64,
    pub horizon: u64,
    pub envelopes: Vec<EventEnvelope>,
    pub states: Vec<MarketState>,
    pub profile: HistoricalProfile,
}

impl SimulationRun {
    /// Sum of demand levels across all ticks
    pub fn total_demand(&self) -> f64 {
        self.states.iter().map(|s| s.demand_level).sum()
    }

    pub fn total_cancellations(&self) -> i64 {
        self.states.iter().map(|s| i64::from(s.cancellations)).sum()
    }
}

/// Event emitted by a model before it is sealed into an envelope
struct Planned {
    domain: &'static str,
    event_type: &'static str,
    payload: Value,
}

fn planned(domain: &'static str, event_type: &'static str, payload: Value) -> Planned {
    Planned {
        domain,
        event_type,
        payload,
    }
}

/// Shared per-tick inputs
struct TickContext<'a> {
    tick: u64,
    profile: &'a HistoricalProfile,
    population: &'a Population,
    rates: &'a RateConfig,
    shocks: Shocks,
    /// Seed-derived demand drift, fixed for the whole run
    seed_variance: f64,
}

struct RequesterStep {
    demand_level: f64,
    bookings: u32,
    drops: u32,
    cancellations: u32,
    no_shows: u32,
    retries: u32,
    events: Vec<Planned>,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn requester_step(ctx: &TickContext<'_>, rng: &mut RngManager) -> RequesterStep {
    let t = ctx.tick as f64;
    let base_demand = ctx.profile.demand_at(ctx.tick);
    let wave = 1.0 + 0.35 * ((t + 1.0) / 3.0).sin();
    let shock = ctx.shocks.demand + ctx.seed_variance;
    let noise = rng.real(0.85, 1.15);
    let demand_level = round_tenth((base_demand * wave * (1.0 + shock) * noise).max(0.0));

    let base_ratio = ctx.profile.cancellations_at(ctx.tick) / base_demand.max(1.0);
    let cancellation_rate = (base_ratio + ctx.shocks.cancellation_bias).clamp(0.0, 0.9);
    let cancellations = (demand_level * cancellation_rate * 0.5).round() as u32;
    let no_shows = (demand_level * cancellation_rate * 0.25).round() as u32;
    let retries = (demand_level * 0.1).round() as u32;

    let mut events = Vec::new();
    let mut bookings = 0;
    let mut drops = 0;
    let mut last_booking: Option<(String, String)> = None;

    let attempts = (demand_level.round() as u32).min(MAX_ATTEMPTS_PER_TICK);
    for attempt in 0..attempts {
        let Some(requester) = ctx.population.pick(ActorKind::Requester, rng) else {
            break;
        };
        let booking_id = format!("sim-{}-booking-{}", ctx.tick, attempt);
        if rng.chance(ctx.rates.booking_attempt) {
            bookings += 1;
            events.push(planned(
                "booking",
                "booking.created",
                json!({
                    "bookingId": booking_id,
                    "requesterId": requester.id,
                    "success": true,
                }),
            ));
            last_booking = Some((booking_id, requester.id.clone()));
        } else {
            drops += 1;
            events.push(planned(
                "booking",
                "booking.dropped",
                json!({
                    "bookingId": booking_id,
                    "requesterId": requester.id,
                    "dropped": true,
                    "reason": "rate_gate",
                }),
            ));
        }
    }

    if cancellations > 0 && rng.chance(ctx.rates.cancel_attempt) {
        let (booking_id, requester_id) = last_booking
            .unwrap_or_else(|| (format!("sim-{}-booking", ctx.tick), String::new()));
        events.push(planned(
            "booking",
            "booking.cancelled",
            json!({
                "bookingId": booking_id,
                "requesterId": requester_id,
                "cancellations": cancellations,
                "reason": "simulated_cancellation",
            }),
        ));
    }

    if retries > 0 {
        events.push(planned(
            "booking",
            "booking.updated",
            json!({
                "bookingId": format!("sim-{}-booking", ctx.tick),
                "changes": {"retries": retries, "lastRetryTick": ctx.tick},
            }),
        ));
    }

    if rng.chance(ctx.rates.support_ticket) {
        let requester_id = ctx
            .population
            .pick(ActorKind::Requester, rng)
            .map(|a| a.id.clone());
        events.push(planned(
            "support",
            "support.ticket_opened",
            json!({
                "ticketId": format!("sim-{}-ticket", ctx.tick),
                "requesterId": requester_id,
            }),
        ));
    }

    RequesterStep {
        demand_level,
        bookings,
        drops,
        cancellations,
        no_shows,
        retries,
        events,
    }
}

fn provider_step(ctx: &TickContext<'_>, rng: &mut RngManager) -> (f64, Vec<Planned>) {
    let base = ctx.profile.providers_at(ctx.tick);
    let shift = 1.0 + 0.2 * (ctx.tick as f64 / 2.0).cos();
    let noise = rng.real(0.85, 1.15);
    let providers_available = round_tenth(base * (shift + ctx.shocks.provider) * noise).max(1.0);

    let events = ctx
        .population
        .pick(ActorKind::Provider, rng)
        .map(|provider| {
            planned(
                "provider",
                "provider.updated",
                json!({
                    "providerId": provider.id,
                    "fields": ["availability", "status"],
                    "updatedAt": ctx.tick,
                    "providersAvailable": providers_available,
                }),
            )
        })
        .into_iter()
        .collect();

    (providers_available, events)
}

struct SystemStep {
    stress_index: f64,
    queue_depth: f64,
    utilization: f64,
    events: Vec<Planned>,
}

fn system_step(
    ctx: &TickContext<'_>,
    demand: f64,
    providers: f64,
    rng: &mut RngManager,
) -> SystemStep {
    let capacity = providers.max(1.0);
    let queue_depth = (demand - capacity).max(0.0);
    let stress_index = if demand == 0.0 {
        0.0
    } else {
        ((demand - capacity) / (demand + capacity)).clamp(0.0, 1.0)
    };
    let utilization = (demand / (demand + capacity)).clamp(0.0, 1.0);
    let latency_ms = (ctx.profile.latency_baseline() * (1.0 + stress_index) * rng.real(0.9, 1.1)
        + queue_depth * 15.0)
        .round();

    let mut events = vec![planned(
        "ops",
        "load.sampled",
        json!({
            "utilization": utilization,
            "latencyMs": latency_ms,
            "queueDepth": queue_depth,
            "stressIndex": stress_index,
        }),
    )];

    let anomaly_score = (stress_index + rng.real(0.0, 0.1)).clamp(0.0, 1.0);
    if anomaly_score > ANOMALY_THRESHOLD {
        events.push(planned(
            "ops",
            "anomaly.detected",
            json!({
                "anomalyId": format!("sim-{}-stress", ctx.tick),
                "severity": if anomaly_score > 0.8 { "high" } else { "medium" },
                "anomalyScore": anomaly_score,
            }),
        ));
    }
    if anomaly_score > TRUST_VIOLATION_THRESHOLD {
        events.push(planned(
            "trust_safety",
            "trust.violation_flagged",
            json!({
                "signals": ["synthetic_stress", "synthetic_queue"],
                "anomalyScore": anomaly_score,
                "violation": true,
            }),
        ));
    }
    if rng.chance(0.02 + 0.2 * stress_index) {
        events.push(planned(
            "booking",
            "booking.failure",
            json!({
                "bookingId": format!("sim-{}-booking", ctx.tick),
                "reason": "capacity_exhausted",
                "failed": true,
            }),
        ));
    }

    SystemStep {
        stress_index,
        queue_depth,
        utilization,
        events,
    }
}

/// Run id for a scenario / config pair
pub fn run_id(scenario: &Scenario, config: &SimulationConfig) -> String {
    let base = format!("simv2-{}-{}", scenario.id(), config.seed);
    match &config.fork_label {
        Some(label) => format!("{}-{}", base, label),
        None => base,
    }
}

/// Run the engine with default shocks
pub fn run(
    scenario: &Scenario,
    registry: &DomainRegistry,
    seed: u64,
    horizon: u64,
) -> Result<SimulationRun, ScenarioError> {
    run_with(scenario, registry, &SimulationConfig::new(seed, horizon))
}

/// Run the engine with explicit parameters
pub fn run_with(
    scenario: &Scenario,
    registry: &DomainRegistry,
    config: &SimulationConfig,
) -> Result<SimulationRun, ScenarioError> {
    if config.horizon == 0 {
        return Err(ScenarioError::InvalidHorizon);
    }
    check_registry(registry, scenario.domains_used())?;
    check_registry(registry, ENGINE_DOMAINS)?;

    let profile = HistoricalProfile::derive(scenario.baseline_envelopes());
    let population = Population::new(scenario.population());
    let mut rng = RngManager::mixed(scenario.seed(), config.seed);
    let seed_variance = rng.real(0.9, 1.1) - 1.0;
    let clock = LogicalClock::default();
    let run_id = run_id(scenario, config);

    let mut envelopes = Vec::new();
    let mut states = Vec::new();

    for tick in 0..config.horizon {
        let ctx = TickContext {
            tick,
            profile: &profile,
            population: &population,
            rates: scenario.rates(),
            shocks: config.shocks,
            seed_variance,
        };

        let requester = requester_step(&ctx, &mut rng.fork(&format!("requester-{}", tick)));
        let (providers_available, provider_events) =
            provider_step(&ctx, &mut rng.fork(&format!("provider-{}", tick)));
        let system = system_step(
            &ctx,
            requester.demand_level,
            providers_available,
            &mut rng.fork(&format!("system-{}", tick)),
        );

        let sim_time = clock.sim_time_at(tick);
        states.push(MarketState {
            tick,
            logical_time: tick,
            sim_time,
            demand_level: requester.demand_level,
            providers_available,
            bookings: requester.bookings,
            drops: requester.drops,
            cancellations: requester.cancellations,
            no_shows: requester.no_shows,
            retries: requester.retries,
            stress_index: system.stress_index,
            queue_depth: system.queue_depth,
            utilization: system.utilization,
        });

        let plans = requester
            .events
            .into_iter()
            .chain(provider_events)
            .chain(system.events);
        let before = envelopes.len();
        for (sequence, plan) in plans.enumerate() {
            envelopes.push(EventEnvelope::new(
                config.seed,
                tick,
                sequence as u32,
                plan.domain,
                plan.event_type,
                plan.payload,
            ));
        }
        tracing::debug!(tick, events = envelopes.len() - before, "tick generated");
    }

    tracing::info!(
        run_id = %run_id,
        horizon = config.horizon,
        envelopes = envelopes.len(),
        "simulation run complete"
    );

    Ok(SimulationRun {
        run_id,
        seed: config.seed,
        horizon: config.horizon,
        envelopes,
        states,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioSpec;

    fn scenario() -> Scenario {
        Scenario::from_history(ScenarioSpec::new("unit", "Unit", 3), &DomainRegistry::default()).unwrap()
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let result = run(&scenario(), &DomainRegistry::default(), 1, 0);
        assert_eq!(result.unwrap_err(), ScenarioError::InvalidHorizon);
    }

    #[test]
    fn test_one_state_per_tick() {
        let result = run(&scenario(), &DomainRegistry::default(), 1, 6).unwrap();
        assert_eq!(result.states.len(), 6);
        for (i, state) in result.states.iter().enumerate() {
            assert_eq!(state.tick, i as u64);
            assert_eq!(state.sim_time, i as u64 * 60_000);
            assert!(state.providers_available >= 1.0);
            assert!((0.0..=1.0).contains(&state.stress_index));
        }
    }

    #[test]
    fn test_long_horizon_fills_states() {
        let result = run(&scenario(), &DomainRegistry::default(), 1, 1_500).unwrap();
        assert_eq!(result.states.len(), 1_500);
        assert_eq!(result.states.last().map(|s| s.tick), Some(1_499));
    }

    #[test]
    fn test_every_tick_samples_load() {
        let result = run(&scenario(), &DomainRegistry::default(), 1, 5).unwrap();
        let samples = result
            .envelopes
            .iter()
            .filter(|e| e.event_type() == "load.sampled")
            .count();
        assert_eq!(samples, 5);
    }

    #[test]
    fn test_sequence_restarts_each_tick() {
        let result = run(&scenario(), &DomainRegistry::default(), 1, 3).unwrap();
        for tick in 0..3 {
            let first = result
                .envelopes
                .iter()
                .find(|e| e.generated_at_tick == tick)
                .unwrap();
            assert_eq!(
                first.id,
                crate::models::make_event_id(1, tick, first.domain(), first.event_type(), 0)
            );
        }
    }

    #[test]
    fn test_fork_label_in_run_id() {
        let mut config = SimulationConfig::new(5, 2);
        config.fork_label = Some("fork-demand-0.5".to_string());
        assert_eq!(run_id(&scenario(), &config), "simv2-unit-5-fork-demand-0.5");
    }
}
