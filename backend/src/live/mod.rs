//! Live traffic driver
//!
//! Drives real traffic against a booking service. Each tick the driver
//! takes one [`LiveRates`] snapshot, samples actors from the roster, plans
//! one action per actor with a tick-forked RNG, and spawns a task per
//! action on a bounded permit pool.
//!
//! The tick loop never waits on collaborators:
//! - a saturated pool skips the action and counts it
//! - failures are logged and counted, never retried
//! - outcomes land in an [`EventBuffer`] as analytics envelopes

pub mod client;

use crate::core::time::{LogicalClock, DEFAULT_TICK_MS};
use crate::models::{
    Actor, ActorKind, AnalyticsEnvelope, Population, PopulationConfig, StandardizedEvent, Timebase,
};
use crate::rates::{LiveRates, RateConfig, RateError};
use crate::rng::RngManager;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub use client::{BookingClient, BookingRequest, BookingResponse, BoxFuture, HttpBookingClient};

/// Source stamped on every envelope the driver emits
pub const LIVE_SOURCE: &str = "live-driver";

/// Version stamped on emitted analytics envelopes
pub const LIVE_ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Invalid live driver config: {0}")]
    Config(String),

    #[error("Invalid rates: {0}")]
    InvalidRates(#[from] RateError),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Collaborator returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LiveDriverConfig {
    pub base_url: String,
    pub seed: u64,
    pub actors_per_tick: usize,
    /// Size of the permit pool; actions beyond it are skipped
    pub max_in_flight: usize,
    pub tick_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Capacity of the emitted-envelope buffer
    pub buffer_capacity: usize,
    pub rates: RateConfig,
    pub population: PopulationConfig,
}

impl Default for LiveDriverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            seed: 0,
            actors_per_tick: 4,
            max_in_flight: 8,
            tick_interval_ms: 1_000,
            request_timeout_ms: 5_000,
            buffer_capacity: 1_000,
            rates: RateConfig::default(),
            population: PopulationConfig::default(),
        }
    }
}

impl LiveDriverConfig {
    pub fn validate(&self) -> Result<(), LiveError> {
        if self.base_url.trim().is_empty() {
            return Err(LiveError::Config("base_url must not be empty".to_string()));
        }
        if self.max_in_flight == 0 {
            return Err(LiveError::Config("max_in_flight must be positive".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(LiveError::Config("tick_interval_ms must be positive".to_string()));
        }
        if self.buffer_capacity == 0 {
            return Err(LiveError::Config("buffer_capacity must be positive".to_string()));
        }
        self.rates.validate()?;
        Ok(())
    }
}

/// Outcome counters shared with in-flight tasks
#[derive(Debug, Default)]
pub struct LiveStats {
    spawned: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStatsSnapshot {
    pub spawned: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl LiveStats {
    pub fn snapshot(&self) -> LiveStatsSnapshot {
        LiveStatsSnapshot {
            spawned: self.spawned.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct BufferInner {
    events: VecDeque<AnalyticsEnvelope>,
    last_logical: u64,
    sequence: u64,
}

/// Capped sink of emitted analytics envelopes
///
/// `timebase.logical` never decreases across pushes, even when a slow
/// task from an earlier tick completes late.
#[derive(Debug)]
pub struct EventBuffer {
    capacity: usize,
    tick_ms: u64,
    inner: Mutex<BufferInner>,
}

impl EventBuffer {
    pub fn new(capacity: usize, tick_ms: u64) -> Self {
        Self {
            capacity,
            tick_ms,
            inner: Mutex::new(BufferInner {
                events: VecDeque::new(),
                last_logical: 0,
                sequence: 0,
            }),
        }
    }

    pub fn push(&self, logical: u64, event_type: &str, payload: Value, metadata: Map<String, Value>) -> AnalyticsEnvelope {
        let mut inner = self.inner.lock();
        let logical = logical.max(inner.last_logical);
        inner.last_logical = logical;
        inner.sequence += 1;

        let envelope = AnalyticsEnvelope {
            id: format!("live-{}-{}", logical, inner.sequence),
            version: LIVE_ENVELOPE_VERSION,
            timestamp: chrono::Utc::now().to_rfc3339(),
            timebase: Timebase {
                logical,
                sim_time: logical * self.tick_ms,
            },
            source: LIVE_SOURCE.to_string(),
            domain: None,
            event: StandardizedEvent {
                event_type: event_type.to_string(),
                payload,
            },
            metadata,
        };
        inner.events.push_back(envelope.clone());
        while inner.events.len() > self.capacity {
            inner.events.pop_front();
        }
        envelope
    }

    pub fn snapshot(&self) -> Vec<AnalyticsEnvelope> {
        self.inner.lock().events.iter().cloned().collect()
    }

    /// Remove and return everything buffered
    pub fn drain(&self) -> Vec<AnalyticsEnvelope> {
        self.inner.lock().events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Book { provider_id: String },
    Cancel { booking_id: String },
    Support,
}

/// Handles spawned by one tick
#[derive(Debug)]
pub struct TickOutcome {
    pub tick: u64,
    pub spawned: usize,
    pub skipped: usize,
    pub handles: Vec<JoinHandle<()>>,
}

impl TickOutcome {
    /// Wait for every task spawned this tick
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "live task aborted");
            }
        }
    }
}

pub struct LiveDriver {
    config: LiveDriverConfig,
    client: Arc<dyn BookingClient>,
    rates: LiveRates,
    population: Population,
    rng: RngManager,
    clock: LogicalClock,
    permits: Arc<Semaphore>,
    stats: Arc<LiveStats>,
    buffer: Arc<EventBuffer>,
    open_bookings: Arc<Mutex<HashMap<String, String>>>,
}

impl LiveDriver {
    pub fn new(config: LiveDriverConfig, client: Arc<dyn BookingClient>) -> Result<Self, LiveError> {
        config.validate()?;
        let rates = LiveRates::new(config.rates)?;
        Ok(Self {
            population: Population::new(&config.population),
            rng: RngManager::new(config.seed),
            clock: LogicalClock::new(DEFAULT_TICK_MS),
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
            stats: Arc::new(LiveStats::default()),
            buffer: Arc::new(EventBuffer::new(config.buffer_capacity, DEFAULT_TICK_MS)),
            open_bookings: Arc::new(Mutex::new(HashMap::new())),
            rates,
            client,
            config,
        })
    }

    /// Driver over [`HttpBookingClient`] at `config.base_url`
    pub fn http(config: LiveDriverConfig) -> Result<Self, LiveError> {
        let client = HttpBookingClient::new(
            &config.base_url,
            Duration::from_millis(config.request_timeout_ms),
        )?;
        Self::new(config, Arc::new(client))
    }

    /// Shared handle for retuning rates while traffic flows
    pub fn rates(&self) -> LiveRates {
        self.rates.clone()
    }

    pub fn stats(&self) -> LiveStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn buffer(&self) -> Arc<EventBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.current_tick()
    }

    fn plan(&self, actor: &Actor, rates: &RateConfig, rng: &mut RngManager) -> Option<Action> {
        if actor.kind == ActorKind::Requester {
            let open = self.open_bookings.lock().get(&actor.id).cloned();
            if let Some(booking_id) = open {
                if rng.chance(rates.cancel_attempt) {
                    return Some(Action::Cancel { booking_id });
                }
            }
            if rng.chance(rates.booking_attempt) {
                if let Some(provider) = self.population.pick(ActorKind::Provider, rng) {
                    return Some(Action::Book {
                        provider_id: provider.id.clone(),
                    });
                }
            }
        }
        rng.chance(rates.support_ticket).then_some(Action::Support)
    }

    /// Run one tick: plan actions and spawn them without waiting
    ///
    /// Must be called from within a tokio runtime.
    pub fn tick(&mut self) -> TickOutcome {
        let tick = self.clock.current_tick();
        let rates = self.rates.snapshot();
        let mut rng = self.rng.fork(&format!("live-{}", tick));
        let actors = self.population.sample(self.config.actors_per_tick, &mut rng);

        let mut handles = Vec::new();
        let mut skipped = 0;
        for actor in actors {
            let Some(action) = self.plan(&actor, &rates, &mut rng) else {
                continue;
            };
            let permit = match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    skipped += 1;
                    self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(tick, actor_id = %actor.id, "permit pool saturated, action skipped");
                    continue;
                }
            };

            self.stats.spawned.fetch_add(1, Ordering::Relaxed);
            let client = Arc::clone(&self.client);
            let stats = Arc::clone(&self.stats);
            let buffer = Arc::clone(&self.buffer);
            let open_bookings = Arc::clone(&self.open_bookings);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                execute(tick, actor, action, client, stats, buffer, open_bookings).await;
            }));
        }

        tracing::debug!(tick, spawned = handles.len(), skipped, "live tick");
        self.clock.advance_tick();
        TickOutcome {
            tick,
            spawned: handles.len(),
            skipped,
            handles,
        }
    }

    /// Drive `ticks` ticks at the configured interval, then wait for stragglers
    pub async fn run(&mut self, ticks: u64) -> LiveStatsSnapshot {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut outstanding = Vec::new();
        for _ in 0..ticks {
            interval.tick().await;
            let outcome = self.tick();
            outstanding.retain(|h: &JoinHandle<()>| !h.is_finished());
            outstanding.extend(outcome.handles);
        }
        for handle in outstanding {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "live task aborted");
            }
        }

        let stats = self.stats();
        tracing::info!(
            ticks,
            spawned = stats.spawned,
            failed = stats.failed,
            skipped = stats.skipped,
            "live run complete"
        );
        stats
    }
}

async fn execute(
    tick: u64,
    actor: Actor,
    action: Action,
    client: Arc<dyn BookingClient>,
    stats: Arc<LiveStats>,
    buffer: Arc<EventBuffer>,
    open_bookings: Arc<Mutex<HashMap<String, String>>>,
) {
    let actor_id = actor.id.clone();
    let started = Instant::now();
    let result = match &action {
        Action::Book { provider_id } => client
            .create_booking(
                actor,
                BookingRequest {
                    provider_id: provider_id.clone(),
                    slot_tick: tick,
                },
            )
            .await
            .map(|resp| {
                if let Some(id) = &resp.booking_id {
                    open_bookings.lock().insert(actor_id.clone(), id.clone());
                }
                ("booking.created", json!({ "success": true, "providerId": provider_id }))
            }),
        Action::Cancel { booking_id } => client
            .cancel_booking(actor, booking_id.clone())
            .await
            .map(|()| {
                open_bookings.lock().remove(&actor_id);
                ("booking.cancelled", json!({ "bookingId": booking_id }))
            }),
        Action::Support => client
            .open_support_ticket(actor, format!("live tick {}", tick))
            .await
            .map(|()| ("support.ticket_opened", json!({}))),
    };
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    let mut metadata = Map::new();
    metadata.insert("actorId".to_string(), json!(actor_id));
    metadata.insert("latencyMs".to_string(), json!(latency_ms));

    match result {
        Ok((event_type, mut payload)) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            payload["latencyMs"] = json!(latency_ms);
            buffer.push(tick, event_type, payload, metadata);
        }
        Err(err) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(tick, actor_id = %actor_id, error = %err, "live action failed");
            let event_type = match action {
                Action::Support => "support.request_failed",
                _ => "booking.failure",
            };
            buffer.push(
                tick,
                event_type,
                json!({ "failed": true, "error": err.to_string(), "latencyMs": latency_ms }),
                metadata,
            );
        }
    }
}
