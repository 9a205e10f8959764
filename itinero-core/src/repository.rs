use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::account::{ProfileUpdate, User};
use crate::booking::{Booking, CancelOutcome};
use crate::catalog::TravelOption;
use crate::error::RepositoryError;
use crate::search::SearchFilters;

/// Read/write access to the travel catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Filtered search over options departing on or after `today` with seats
    /// available, ordered by (departure_date, departure_time) ascending.
    /// Filters must already be validated.
    async fn search_options(
        &self,
        filters: &SearchFilters,
        today: NaiveDate,
    ) -> Result<Vec<TravelOption>, RepositoryError>;

    async fn get_option(&self, travel_code: &str)
        -> Result<Option<TravelOption>, RepositoryError>;

    /// Up to `limit` other bookable options on the same route.
    async fn similar_options(
        &self,
        option: &TravelOption,
        today: NaiveDate,
        limit: u32,
    ) -> Result<Vec<TravelOption>, RepositoryError>;

    /// Sorted distinct city names (source or destination) containing `query`,
    /// case-insensitively.
    async fn suggest_cities(&self, query: &str) -> Result<Vec<String>, RepositoryError>;

    async fn insert_option(&self, option: &TravelOption) -> Result<(), RepositoryError>;
}

/// Booking lifecycle. Implementations must make the seat accounting in
/// `create_booking` and `cancel_booking` atomic against concurrent callers: the
/// read-validate-write on `available_seats` happens under a row lock
/// (Postgres) or a store-wide mutex (in-memory), never on a stale read.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Validate the seat count against live availability, decrement, and
    /// persist the confirmed booking, all-or-nothing.
    async fn create_booking(
        &self,
        travel_code: &str,
        user_id: Uuid,
        seats: u32,
        passenger_details: serde_json::Value,
    ) -> Result<Booking, RepositoryError>;

    /// Cancel the caller's booking and restore its seats. A booking that
    /// does not exist or belongs to someone else is `NotFound`; one already
    /// cancelled yields `AlreadyCancelled` with no second refund.
    async fn cancel_booking(
        &self,
        booking_code: &str,
        user_id: Uuid,
    ) -> Result<CancelOutcome, RepositoryError>;

    /// The caller's bookings, newest first.
    async fn list_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user. `Duplicate("username")` when the name is taken.
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError>;
}
