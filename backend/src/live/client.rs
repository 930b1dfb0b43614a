//! Booking collaborator client
//!
//! The live driver talks to the booking service only through
//! [`BookingClient`]. [`HttpBookingClient`] is the production
//! implementation; tests plug in an in-process mock.

use super::LiveError;
use crate::models::Actor;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const CREATE_BOOKING_PATH: &str = "/api/bookings/create";
pub const CANCEL_BOOKING_PATH: &str = "/api/bookings/cancel";
pub const SUPPORT_TICKET_PATH: &str = "/api/v1/support/tickets";

/// Body of a booking-create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub provider_id: String,
    /// Logical tick the slot is requested for
    pub slot_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookingResponse {
    #[serde(default, alias = "id")]
    pub booking_id: Option<String>,
}

/// Booking, cancellation and support-ticket endpoints
pub trait BookingClient: Send + Sync {
    fn create_booking(
        &self,
        actor: Actor,
        request: BookingRequest,
    ) -> BoxFuture<'_, Result<BookingResponse, LiveError>>;

    fn cancel_booking(&self, actor: Actor, booking_id: String) -> BoxFuture<'_, Result<(), LiveError>>;

    fn open_support_ticket(&self, actor: Actor, subject: String) -> BoxFuture<'_, Result<(), LiveError>>;
}

/// reqwest-backed [`BookingClient`]
///
/// Every request carries the acting identity in `x-actor-id` and
/// `x-actor-role`.
#[derive(Debug, Clone)]
pub struct HttpBookingClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBookingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LiveError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, actor: &Actor, path: &str, body: Value) -> Result<String, LiveError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("x-actor-id", actor.id.as_str())
            .header("x-actor-role", actor.kind.role())
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LiveError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

impl BookingClient for HttpBookingClient {
    fn create_booking(
        &self,
        actor: Actor,
        request: BookingRequest,
    ) -> BoxFuture<'_, Result<BookingResponse, LiveError>> {
        Box::pin(async move {
            let body = json!({
                "vendor_id": request.provider_id,
                "slot_tick": request.slot_tick,
            });
            let text = self.post(&actor, CREATE_BOOKING_PATH, body).await?;
            // Bodies without an id are still successful bookings.
            Ok(serde_json::from_str(&text).unwrap_or_default())
        })
    }

    fn cancel_booking(&self, actor: Actor, booking_id: String) -> BoxFuture<'_, Result<(), LiveError>> {
        Box::pin(async move {
            self.post(&actor, CANCEL_BOOKING_PATH, json!({ "booking_id": booking_id }))
                .await?;
            Ok(())
        })
    }

    fn open_support_ticket(&self, actor: Actor, subject: String) -> BoxFuture<'_, Result<(), LiveError>> {
        Box::pin(async move {
            self.post(&actor, SUPPORT_TICKET_PATH, json!({ "subject": subject }))
                .await?;
            Ok(())
        })
    }
}
