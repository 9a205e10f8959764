use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use itinero_core::booking::{
    self, Booking, BookingStatus, CancelOutcome, generate_booking_code, total_price_minor,
};
use itinero_core::error::RepositoryError;
use itinero_core::repository::BookingRepository;

use crate::map_sqlx_err;

/// Transient conflicts (serialization failures, deadlocks, booking-code
/// collisions) are retried this many times before surfacing as `Conflict`.
const MAX_CONFLICT_RETRIES: u32 = 3;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OptionSeatRow {
    id: Uuid,
    travel_code: String,
    price_minor: i64,
    available_seats: i32,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_code: String,
    user_id: Uuid,
    travel_option_id: Uuid,
    travel_code: String,
    seats: i32,
    total_price_minor: i64,
    status: String,
    created_at: DateTime<Utc>,
    passenger_details: serde_json::Value,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status).ok_or_else(|| {
            RepositoryError::Backend(format!("unknown booking status: {}", row.status))
        })?;
        Ok(Booking {
            id: row.id,
            booking_code: row.booking_code,
            user_id: row.user_id,
            travel_option_id: row.travel_option_id,
            travel_code: row.travel_code,
            seats: row.seats.max(0) as u32,
            total_price_minor: row.total_price_minor,
            status,
            created_at: row.created_at,
            passenger_details: row.passenger_details,
        })
    }
}

impl PgBookingRepository {
    /// One attempt at the read-validate-decrement-insert sequence. The
    /// `FOR UPDATE` lock on the travel option row holds for the whole
    /// transaction, so the availability we validate against cannot move
    /// under us; two concurrent requests serialize here instead of both
    /// passing the check.
    async fn try_create(
        &self,
        travel_code: &str,
        user_id: Uuid,
        seats: u32,
        passenger_details: &serde_json::Value,
    ) -> Result<Booking, RepositoryError> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await.map_err(map_sqlx_err)?;

        let option: Option<OptionSeatRow> = sqlx::query_as(
            "SELECT id, travel_code, price_minor, available_seats \
             FROM travel_options WHERE travel_code = $1 FOR UPDATE",
        )
        .bind(travel_code)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let option = option.ok_or(RepositoryError::NotFound)?;
        let available = option.available_seats.max(0) as u32;

        // Dropping the transaction on error rolls everything back.
        booking::validate_seat_count(seats, available)?;

        sqlx::query(
            "UPDATE travel_options \
             SET available_seats = available_seats - $1, updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(seats as i32)
        .bind(option.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let booking = Booking {
            id: Uuid::new_v4(),
            booking_code: generate_booking_code(),
            user_id,
            travel_option_id: option.id,
            travel_code: option.travel_code,
            seats,
            total_price_minor: total_price_minor(option.price_minor, seats),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
            passenger_details: passenger_details.clone(),
        };

        sqlx::query(
            "INSERT INTO bookings \
                 (id, booking_code, user_id, travel_option_id, seats, \
                  total_price_minor, status, passenger_details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(booking.id)
        .bind(&booking.booking_code)
        .bind(booking.user_id)
        .bind(booking.travel_option_id)
        .bind(booking.seats as i32)
        .bind(booking.total_price_minor)
        .bind(booking.status.as_str())
        .bind(&booking.passenger_details)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_err(e) {
            // A booking_code collision; retryable with a fresh code.
            RepositoryError::Duplicate(_) => RepositoryError::Conflict,
            other => other,
        })?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(booking)
    }

    async fn try_cancel(
        &self,
        booking_code: &str,
        user_id: Uuid,
    ) -> Result<CancelOutcome, RepositoryError> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await.map_err(map_sqlx_err)?;

        // Scoping the lock to the booking row; the option row gets locked by
        // the seat refund below.
        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT b.id, b.booking_code, b.user_id, b.travel_option_id, \
                    t.travel_code, b.seats, b.total_price_minor, b.status, \
                    b.created_at, b.passenger_details \
             FROM bookings b \
             JOIN travel_options t ON t.id = b.travel_option_id \
             WHERE b.booking_code = $1 AND b.user_id = $2 \
             FOR UPDATE OF b",
        )
        .bind(booking_code)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let row = row.ok_or(RepositoryError::NotFound)?;
        let mut booking = Booking::try_from(row)?;

        if !booking.cancel() {
            // Already cancelled: report it, refund nothing.
            return Ok(CancelOutcome::AlreadyCancelled(booking));
        }

        sqlx::query("UPDATE bookings SET status = $1 WHERE id = $2")
            .bind(booking.status.as_str())
            .bind(booking.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        sqlx::query(
            "UPDATE travel_options \
             SET available_seats = LEAST(total_seats, available_seats + $1), \
                 updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(booking.seats as i32)
        .bind(booking.travel_option_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(CancelOutcome::Cancelled(booking))
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(
        &self,
        travel_code: &str,
        user_id: Uuid,
        seats: u32,
        passenger_details: serde_json::Value,
    ) -> Result<Booking, RepositoryError> {
        let mut attempt = 0;
        loop {
            match self
                .try_create(travel_code, user_id, seats, &passenger_details)
                .await
            {
                Err(RepositoryError::Conflict) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(travel_code, attempt, "seat allocation conflict, retrying");
                }
                Ok(booking) => {
                    info!(
                        booking_code = %booking.booking_code,
                        travel_code,
                        seats,
                        "booking confirmed"
                    );
                    return Ok(booking);
                }
                other => return other,
            }
        }
    }

    async fn cancel_booking(
        &self,
        booking_code: &str,
        user_id: Uuid,
    ) -> Result<CancelOutcome, RepositoryError> {
        let mut attempt = 0;
        loop {
            match self.try_cancel(booking_code, user_id).await {
                Err(RepositoryError::Conflict) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(booking_code, attempt, "cancel conflict, retrying");
                }
                Ok(outcome) => {
                    if let CancelOutcome::Cancelled(b) = &outcome {
                        info!(booking_code = %b.booking_code, seats = b.seats, "booking cancelled");
                    }
                    return Ok(outcome);
                }
                other => return other,
            }
        }
    }

    async fn list_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, RepositoryError> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT b.id, b.booking_code, b.user_id, b.travel_option_id, \
                    t.travel_code, b.seats, b.total_price_minor, b.status, \
                    b.created_at, b.passenger_details \
             FROM bookings b \
             JOIN travel_options t ON t.id = b.travel_option_id \
             WHERE b.user_id = $1 \
             ORDER BY b.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
