use axum::{extract::State, routing::post, Json, Router};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use itinero_core::catalog::{parse_price_minor, TravelMode, TravelOption};

use crate::error::AppError;
use crate::search::TravelOptionResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTravelOptionRequest {
    pub travel_code: String,
    pub mode: TravelMode,
    pub source: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: NaiveDate,
    pub arrival_time: NaiveTime,
    /// Decimal price string, e.g. "8500.00".
    pub price: String,
    pub total_seats: u32,
    /// Defaults to `total_seats` for a fresh option.
    pub available_seats: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/travel-options", post(create_travel_option))
}

async fn create_travel_option(
    State(state): State<AppState>,
    Json(req): Json<CreateTravelOptionRequest>,
) -> Result<Json<TravelOptionResponse>, AppError> {
    let now = Utc::now();
    let option = TravelOption {
        id: Uuid::new_v4(),
        travel_code: req.travel_code,
        mode: req.mode,
        source: req.source.trim().to_string(),
        destination: req.destination.trim().to_string(),
        departure_date: req.departure_date,
        departure_time: req.departure_time,
        arrival_date: req.arrival_date,
        arrival_time: req.arrival_time,
        price_minor: parse_price_minor(&req.price)?,
        total_seats: req.total_seats,
        available_seats: req.available_seats.unwrap_or(req.total_seats),
        created_at: now,
        updated_at: now,
    };

    option.validate(now.date_naive())?;
    state.catalog.insert_option(&option).await?;

    info!(travel_code = %option.travel_code, "travel option created");
    Ok(Json(option.into()))
}
