use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use itinero_core::booking::{Booking, BookingStatus, CancelOutcome};
use itinero_core::catalog::format_price_minor;

use crate::error::AppError;
use crate::middleware::auth::CustomerClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub travel_code: String,
    pub seats: u32,
    pub passenger_details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_code: String,
    pub travel_code: String,
    pub seats: u32,
    pub total_price: String,
    pub total_price_minor: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub passenger_details: serde_json::Value,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        BookingResponse {
            booking_code: booking.booking_code,
            travel_code: booking.travel_code,
            seats: booking.seats,
            total_price: format_price_minor(booking.total_price_minor),
            total_price_minor: booking.total_price_minor,
            status: booking.status,
            created_at: booking.created_at,
            passenger_details: booking.passenger_details,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub outcome: &'static str,
    pub booking: BookingResponse,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{booking_code}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let user_id = claims.user_id()?;
    let details = req.passenger_details.unwrap_or_else(|| serde_json::json!({}));

    let booking = state
        .bookings
        .create_booking(&req.travel_code, user_id, req.seats, details)
        .await?;

    info!(
        booking_code = %booking.booking_code,
        username = %claims.username,
        "booking confirmed"
    );
    Ok(Json(booking.into()))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.bookings.list_bookings(claims.user_id()?).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_code): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    let outcome = state
        .bookings
        .cancel_booking(&booking_code, claims.user_id()?)
        .await?;

    let response = match outcome {
        CancelOutcome::Cancelled(booking) => {
            info!(booking_code = %booking.booking_code, username = %claims.username, "booking cancelled");
            CancelResponse {
                outcome: "cancelled",
                booking: booking.into(),
            }
        }
        // Not an error: report it and refund nothing.
        CancelOutcome::AlreadyCancelled(booking) => CancelResponse {
            outcome: "already_cancelled",
            booking: booking.into(),
        },
    };

    Ok(Json(response))
}
