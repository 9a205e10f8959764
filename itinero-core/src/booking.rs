use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Per-booking seat limit, independent of what the option has available.
pub const MAX_SEATS_PER_BOOKING: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// A confirmed reservation of seats on one travel option.
///
/// `total_price_minor` is fixed when the booking is created; later catalog
/// price changes do not touch it. Status only ever moves
/// `Confirmed -> Cancelled`, and only through the cancel operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_code: String,
    pub user_id: Uuid,
    pub travel_option_id: Uuid,
    pub travel_code: String,
    pub seats: u32,
    pub total_price_minor: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub passenger_details: serde_json::Value,
}

impl Booking {
    /// Apply the one-way `Confirmed -> Cancelled` transition. Returns false
    /// when the booking was already cancelled, in which case nothing changed
    /// and no seats may be refunded a second time.
    pub fn cancel(&mut self) -> bool {
        match self.status {
            BookingStatus::Confirmed => {
                self.status = BookingStatus::Cancelled;
                true
            }
            BookingStatus::Cancelled => false,
        }
    }
}

/// Outcome of a cancel request. "Already cancelled" is a reportable no-op,
/// not an error.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Booking),
    AlreadyCancelled(Booking),
}

impl CancelOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            CancelOutcome::Cancelled(b) | CancelOutcome::AlreadyCancelled(b) => b,
        }
    }
}

/// Validate a requested seat count against the per-booking limit and the
/// option's current availability. Call this while holding whatever lock
/// protects `available`; validating a stale read permits overselling.
pub fn validate_seat_count(seats: u32, available: u32) -> Result<(), ValidationError> {
    if seats == 0 {
        return Err(ValidationError::NoSeatsRequested);
    }
    if seats > MAX_SEATS_PER_BOOKING {
        return Err(ValidationError::TooManySeats);
    }
    if seats > available {
        return Err(ValidationError::InsufficientSeats { available });
    }
    Ok(())
}

/// Total price in minor units, computed once at booking time.
pub fn total_price_minor(price_minor: i64, seats: u32) -> i64 {
    price_minor * i64::from(seats)
}

/// Short booking code: "BK" + 8 uppercase hex chars of a fresh v4 UUID.
/// Collision probability is low but nonzero; the store's unique index on
/// `booking_code` is the actual guarantee, and the Postgres repository
/// regenerates on a duplicate-key insert.
pub fn generate_booking_code() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("BK{}", token[..8].to_uppercase())
}
