//! Tests for the live traffic driver against an in-process booking client

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sim_governance_core::live::{
    BookingClient, BookingRequest, BookingResponse, BoxFuture, LiveDriver, LiveDriverConfig, LiveError,
    LIVE_SOURCE,
};
use sim_governance_core::control::{ControlPlane, ControlPlaneConfig};
use sim_governance_core::metrics::{MetricId, Zone};
use sim_governance_core::models::{Actor, PopulationConfig};
use sim_governance_core::rates::{RateConfig, RateUpdate};

#[derive(Default)]
struct MockClient {
    fail: bool,
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl MockClient {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn record(&self, call: String) -> Result<(), LiveError> {
        self.calls.lock().push(call);
        if self.fail {
            return Err(LiveError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn sorted_calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().clone();
        calls.sort();
        calls
    }
}

impl BookingClient for MockClient {
    fn create_booking(
        &self,
        actor: Actor,
        request: BookingRequest,
    ) -> BoxFuture<'_, Result<BookingResponse, LiveError>> {
        Box::pin(async move {
            self.record(format!("create:{}:{}", actor.id, request.provider_id))?;
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            Ok(BookingResponse {
                booking_id: Some(format!("bk_{}", n)),
            })
        })
    }

    fn cancel_booking(&self, actor: Actor, booking_id: String) -> BoxFuture<'_, Result<(), LiveError>> {
        Box::pin(async move { self.record(format!("cancel:{}:{}", actor.id, booking_id)) })
    }

    fn open_support_ticket(&self, actor: Actor, _subject: String) -> BoxFuture<'_, Result<(), LiveError>> {
        Box::pin(async move { self.record(format!("support:{}", actor.id)) })
    }
}

/// Every actor sampled each tick; requesters always try to book
fn config(max_in_flight: usize, rates: RateConfig) -> LiveDriverConfig {
    LiveDriverConfig {
        seed: 17,
        actors_per_tick: 9,
        max_in_flight,
        tick_interval_ms: 1,
        rates,
        population: PopulationConfig {
            requesters: 8,
            providers: 1,
        },
        ..LiveDriverConfig::default()
    }
}

fn always_book() -> RateConfig {
    RateConfig {
        booking_attempt: 1.0,
        cancel_attempt: 0.0,
        support_ticket: 0.0,
    }
}

#[tokio::test]
async fn test_tick_spawns_and_records_outcomes() {
    let client = Arc::new(MockClient::default());
    let mut driver = LiveDriver::new(config(16, always_book()), client.clone()).unwrap();

    let outcome = driver.tick();
    assert_eq!(outcome.tick, 0);
    assert_eq!(outcome.spawned, 8);
    assert_eq!(outcome.skipped, 0);
    outcome.join().await;

    let stats = driver.stats();
    assert_eq!(stats.spawned, 8);
    assert_eq!(stats.succeeded, 8);
    assert_eq!(stats.failed, 0);

    let envelopes = driver.buffer().snapshot();
    assert_eq!(envelopes.len(), 8);
    for envelope in &envelopes {
        assert_eq!(envelope.source, LIVE_SOURCE);
        assert_eq!(envelope.event.event_type, "booking.created");
        assert_eq!(envelope.timebase.logical, 0);
        assert!(envelope.latency_hint().is_some());
    }
    assert_eq!(driver.current_tick(), 1);
}

#[tokio::test]
async fn test_saturated_pool_skips_without_waiting() {
    let client = Arc::new(MockClient::default());
    let mut driver = LiveDriver::new(config(1, always_book()), client.clone()).unwrap();

    let outcome = driver.tick();
    assert_eq!(outcome.spawned, 1);
    assert_eq!(outcome.skipped, 7);
    outcome.join().await;

    let stats = driver.stats();
    assert_eq!(stats.skipped, 7);
    assert_eq!(client.calls.lock().len(), 1);
}

#[tokio::test]
async fn test_failures_counted_not_propagated() {
    let client = Arc::new(MockClient::failing());
    let mut driver = LiveDriver::new(config(16, always_book()), client.clone()).unwrap();

    driver.tick().join().await;

    let stats = driver.stats();
    assert_eq!(stats.failed, 8);
    assert_eq!(stats.succeeded, 0);
    // One call per action: no retries.
    assert_eq!(client.calls.lock().len(), 8);
    let envelopes = driver.buffer().snapshot();
    assert!(envelopes.iter().all(|e| e.event.event_type == "booking.failure"));
    assert!(envelopes.iter().all(|e| e.event.payload["failed"] == true));
}

#[tokio::test]
async fn test_open_bookings_get_cancelled() {
    let rates = RateConfig {
        cancel_attempt: 1.0,
        ..always_book()
    };
    let client = Arc::new(MockClient::default());
    let mut driver = LiveDriver::new(config(16, rates), client.clone()).unwrap();

    driver.tick().join().await;
    driver.tick().join().await;

    let calls = client.sorted_calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("create:")).count(), 8);
    assert_eq!(calls.iter().filter(|c| c.starts_with("cancel:")).count(), 8);

    let envelopes = driver.buffer().snapshot();
    let cancelled = envelopes
        .iter()
        .filter(|e| e.event.event_type == "booking.cancelled")
        .count();
    assert_eq!(cancelled, 8);
    assert!(envelopes.windows(2).all(|w| w[0].timebase.logical <= w[1].timebase.logical));
}

#[tokio::test]
async fn test_rate_update_applies_next_tick() {
    let client = Arc::new(MockClient::default());
    let mut driver = LiveDriver::new(config(16, always_book()), client.clone()).unwrap();

    driver
        .rates()
        .update(&RateUpdate {
            booking_attempt: Some(0.0),
            ..RateUpdate::default()
        })
        .unwrap();
    let outcome = driver.tick();
    assert_eq!(outcome.spawned, 0);
    outcome.join().await;
    assert!(client.calls.lock().is_empty());
}

#[tokio::test]
async fn test_same_seed_same_actions() {
    let a = Arc::new(MockClient::default());
    let b = Arc::new(MockClient::default());
    let rates = RateConfig {
        booking_attempt: 0.5,
        cancel_attempt: 0.5,
        support_ticket: 0.3,
    };
    let mut first = LiveDriver::new(config(16, rates), a.clone()).unwrap();
    let mut second = LiveDriver::new(config(16, rates), b.clone()).unwrap();

    for _ in 0..3 {
        first.tick().join().await;
        second.tick().join().await;
    }

    // Task completion order may differ; the set of actions may not.
    let strip = |calls: Vec<String>| -> Vec<String> {
        calls
            .into_iter()
            .map(|c| c.split(":bk_").next().unwrap_or_default().to_string())
            .collect()
    };
    assert_eq!(strip(a.sorted_calls()), strip(b.sorted_calls()));
}

#[tokio::test]
async fn test_run_drives_ticks() {
    let client = Arc::new(MockClient::default());
    let mut driver = LiveDriver::new(config(16, always_book()), client.clone()).unwrap();

    let stats = driver.run(2).await;
    assert_eq!(driver.current_tick(), 2);
    assert_eq!(stats.spawned, stats.succeeded + stats.failed);
    assert!(stats.spawned >= 8);
}

#[test]
fn test_invalid_config_rejected() {
    let client = Arc::new(MockClient::default());
    let bad = LiveDriverConfig {
        base_url: String::new(),
        ..LiveDriverConfig::default()
    };
    assert!(matches!(LiveDriver::new(bad, client), Err(LiveError::Config(_))));
}

#[tokio::test]
async fn test_live_failures_reach_control_plane_dials() {
    let client = Arc::new(MockClient::failing());
    let mut driver = LiveDriver::new(config(16, always_book()), client).unwrap();
    driver.tick().join().await;
    let envelopes = driver.buffer().snapshot();
    assert!(envelopes.iter().all(|e| e.event.payload["latencyMs"].is_f64()));

    let plane = ControlPlane::new(ControlPlaneConfig::default());
    plane.start();
    plane.ingest_live(&envelopes).unwrap();

    let status = plane.status();
    assert_eq!(status.events.len(), 8);
    let error_rate = status
        .dials
        .iter()
        .find(|d| d.metric == MetricId::ErrorRate)
        .unwrap();
    assert_eq!(error_rate.value, 1.0);
    assert_eq!(error_rate.zone, Zone::Red);
}

#[tokio::test]
async fn test_successful_actions_carry_payload_latency() {
    let client = Arc::new(MockClient::default());
    let mut driver = LiveDriver::new(config(16, always_book()), client).unwrap();
    driver.tick().join().await;
    for envelope in driver.buffer().snapshot() {
        assert!(envelope.event.payload["latencyMs"].as_f64().unwrap() >= 0.0);
        assert_eq!(envelope.event.payload["success"], true);
    }
}
