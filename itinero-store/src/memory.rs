use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use itinero_core::account::{ProfileUpdate, User};
use itinero_core::booking::{
    Booking, BookingStatus, CancelOutcome, generate_booking_code, total_price_minor,
};
use itinero_core::catalog::TravelOption;
use itinero_core::error::RepositoryError;
use itinero_core::repository::{BookingRepository, CatalogRepository, UserRepository};
use itinero_core::search::SearchFilters;

#[derive(Default)]
struct Inner {
    options: Vec<TravelOption>,
    bookings: Vec<Booking>,
    users: Vec<User>,
}

/// In-memory store backing tests and local runs. One mutex guards all
/// state, so every read-validate-write on `available_seats` is atomic by
/// construction, matching the row-lock discipline of the Postgres
/// repositories.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_option(&self, option: TravelOption) {
        self.inner.lock().await.options.push(option);
    }

    pub async fn seed_user(&self, user: User) {
        self.inner.lock().await.users.push(user);
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn search_options(
        &self,
        filters: &SearchFilters,
        today: NaiveDate,
    ) -> Result<Vec<TravelOption>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut results: Vec<TravelOption> = inner
            .options
            .iter()
            .filter(|o| o.departure_date >= today && o.available_seats > 0)
            .filter(|o| filters.source().is_none_or(|s| contains_ci(&o.source, s)))
            .filter(|o| {
                filters
                    .destination()
                    .is_none_or(|d| contains_ci(&o.destination, d))
            })
            .filter(|o| filters.mode.is_none_or(|m| o.mode == m))
            .filter(|o| filters.date.is_none_or(|d| o.departure_date == d))
            .filter(|o| filters.min_price_minor.is_none_or(|p| o.price_minor >= p))
            .filter(|o| filters.max_price_minor.is_none_or(|p| o.price_minor <= p))
            .cloned()
            .collect();
        results.sort_by_key(|o| (o.departure_date, o.departure_time));
        Ok(results)
    }

    async fn get_option(
        &self,
        travel_code: &str,
    ) -> Result<Option<TravelOption>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .options
            .iter()
            .find(|o| o.travel_code == travel_code)
            .cloned())
    }

    async fn similar_options(
        &self,
        option: &TravelOption,
        today: NaiveDate,
        limit: u32,
    ) -> Result<Vec<TravelOption>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut results: Vec<TravelOption> = inner
            .options
            .iter()
            .filter(|o| {
                o.travel_code != option.travel_code
                    && o.source == option.source
                    && o.destination == option.destination
                    && o.departure_date >= today
                    && o.available_seats > 0
            })
            .cloned()
            .collect();
        results.sort_by_key(|o| (o.departure_date, o.departure_time));
        results.truncate(limit as usize);
        Ok(results)
    }

    async fn suggest_cities(&self, query: &str) -> Result<Vec<String>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut cities = BTreeSet::new();
        for option in &inner.options {
            if contains_ci(&option.source, query) {
                cities.insert(option.source.clone());
            }
            if contains_ci(&option.destination, query) {
                cities.insert(option.destination.clone());
            }
        }
        Ok(cities.into_iter().collect())
    }

    async fn insert_option(&self, option: &TravelOption) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().await;
        if inner
            .options
            .iter()
            .any(|o| o.travel_code == option.travel_code)
        {
            return Err(RepositoryError::Duplicate("travel_code"));
        }
        inner.options.push(option.clone());
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(
        &self,
        travel_code: &str,
        user_id: Uuid,
        seats: u32,
        passenger_details: serde_json::Value,
    ) -> Result<Booking, RepositoryError> {
        let mut inner = self.inner.lock().await;

        let mut booking_code = generate_booking_code();
        while inner.bookings.iter().any(|b| b.booking_code == booking_code) {
            booking_code = generate_booking_code();
        }

        let option = inner
            .options
            .iter_mut()
            .find(|o| o.travel_code == travel_code)
            .ok_or(RepositoryError::NotFound)?;

        // Holding the store lock makes check-then-decrement atomic.
        option.reserve_seats(seats)?;
        option.updated_at = Utc::now();

        let booking = Booking {
            id: Uuid::new_v4(),
            booking_code,
            user_id,
            travel_option_id: option.id,
            travel_code: option.travel_code.clone(),
            seats,
            total_price_minor: total_price_minor(option.price_minor, seats),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
            passenger_details,
        };
        inner.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn cancel_booking(
        &self,
        booking_code: &str,
        user_id: Uuid,
    ) -> Result<CancelOutcome, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let Inner {
            options, bookings, ..
        } = &mut *inner;

        let booking = bookings
            .iter_mut()
            .find(|b| b.booking_code == booking_code && b.user_id == user_id)
            .ok_or(RepositoryError::NotFound)?;

        if !booking.cancel() {
            return Ok(CancelOutcome::AlreadyCancelled(booking.clone()));
        }

        if let Some(option) = options.iter_mut().find(|o| o.id == booking.travel_option_id) {
            option.release_seats(booking.seats);
            option.updated_at = Utc::now();
        }

        Ok(CancelOutcome::Cancelled(booking.clone()))
    }

    async fn list_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, RepositoryError> {
        let inner = self.inner.lock().await;
        let mut results: Vec<Booking> = inner
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Duplicate("username"));
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.email = update.email.clone();
        user.full_name = update.full_name.clone();
        user.phone = update.phone.clone();
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use itinero_core::catalog::TravelMode;
    use itinero_core::error::ValidationError;
    use std::sync::Arc;

    fn option(travel_code: &str, available: u32) -> TravelOption {
        let now = Utc::now();
        TravelOption {
            id: Uuid::new_v4(),
            travel_code: travel_code.to_string(),
            mode: TravelMode::Train,
            source: "Mumbai".to_string(),
            destination: "Delhi".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            arrival_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            price_minor: 850_000,
            total_seats: 60,
            available_seats: available,
            created_at: now,
            updated_at: now,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn booking_decrements_and_prices() {
        let store = MemoryStore::new();
        store.seed_option(option("TRV1001", 50)).await;
        let user = Uuid::new_v4();

        let booking = store
            .create_booking("TRV1001", user, 2, serde_json::json!({}))
            .await
            .unwrap();

        // 8500.00 x 2 = 17000.00
        assert_eq!(booking.total_price_minor, 1_700_000);
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let opt = store.get_option("TRV1001").await.unwrap().unwrap();
        assert_eq!(opt.available_seats, 48);
    }

    #[tokio::test]
    async fn overbooking_fails_without_mutation() {
        let store = MemoryStore::new();
        store.seed_option(option("TRV1001", 3)).await;

        let err = store
            .create_booking("TRV1001", Uuid::new_v4(), 5, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Validation(ValidationError::InsufficientSeats { available: 3 })
        ));

        let opt = store.get_option("TRV1001").await.unwrap().unwrap();
        assert_eq!(opt.available_seats, 3);
    }

    #[tokio::test]
    async fn unknown_option_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .create_booking("TRV9999", Uuid::new_v4(), 1, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn cancel_restores_seats_exactly_once() {
        let store = MemoryStore::new();
        store.seed_option(option("TRV1001", 50)).await;
        let user = Uuid::new_v4();

        let booking = store
            .create_booking("TRV1001", user, 4, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(
            store
                .get_option("TRV1001")
                .await
                .unwrap()
                .unwrap()
                .available_seats,
            46
        );

        let outcome = store.cancel_booking(&booking.booking_code, user).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::Cancelled(_)));
        assert_eq!(outcome.booking().status, BookingStatus::Cancelled);
        assert_eq!(
            store
                .get_option("TRV1001")
                .await
                .unwrap()
                .unwrap()
                .available_seats,
            50
        );

        // Second cancel is a no-op: no double refund.
        let outcome = store.cancel_booking(&booking.booking_code, user).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::AlreadyCancelled(_)));
        assert_eq!(
            store
                .get_option("TRV1001")
                .await
                .unwrap()
                .unwrap()
                .available_seats,
            50
        );
    }

    #[tokio::test]
    async fn cancel_requires_ownership() {
        let store = MemoryStore::new();
        store.seed_option(option("TRV1001", 50)).await;
        let owner = Uuid::new_v4();

        let booking = store
            .create_booking("TRV1001", owner, 1, serde_json::json!({}))
            .await
            .unwrap();

        let err = store
            .cancel_booking(&booking.booking_code, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_bookings_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        store.seed_option(option("TRV1001", 1)).await;

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .create_booking("TRV1001", Uuid::new_v4(), 1, serde_json::json!({}))
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .create_booking("TRV1001", Uuid::new_v4(), 1, serde_json::json!({}))
                    .await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        // Exactly one of the two simultaneous requests wins the last seat.
        assert!(a.is_ok() != b.is_ok());

        let opt = store.get_option("TRV1001").await.unwrap().unwrap();
        assert_eq!(opt.available_seats, 0);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryStore::new();
        store.seed_option(option("TRV1001", 50)).await;
        let user = Uuid::new_v4();

        let first = store
            .create_booking("TRV1001", user, 1, serde_json::json!({}))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .create_booking("TRV1001", user, 2, serde_json::json!({}))
            .await
            .unwrap();

        let listed = store.list_bookings(user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].booking_code, second.booking_code);
        assert_eq!(listed[1].booking_code, first.booking_code);
    }

    #[tokio::test]
    async fn search_filters_and_orders() {
        let store = MemoryStore::new();
        let mut early = option("TRV1001", 10);
        early.departure_date = NaiveDate::from_ymd_opt(2030, 5, 1).unwrap();
        let mut late = option("TRV1002", 10);
        late.departure_date = NaiveDate::from_ymd_opt(2030, 7, 1).unwrap();
        let mut sold_out = option("TRV1003", 0);
        sold_out.departure_date = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        store.seed_option(late).await;
        store.seed_option(early).await;
        store.seed_option(sold_out).await;

        let results = store
            .search_options(&SearchFilters::default(), today())
            .await
            .unwrap();
        let codes: Vec<&str> = results.iter().map(|o| o.travel_code.as_str()).collect();
        // Sold-out options are hidden; remainder ordered by departure.
        assert_eq!(codes, vec!["TRV1001", "TRV1002"]);

        let filters = SearchFilters {
            source: Some("mum".to_string()),
            min_price_minor: Some(800_000),
            ..Default::default()
        };
        assert_eq!(store.search_options(&filters, today()).await.unwrap().len(), 2);

        let filters = SearchFilters {
            min_price_minor: Some(900_000),
            ..Default::default()
        };
        assert!(store.search_options(&filters, today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn city_suggestions_are_sorted_and_distinct() {
        let store = MemoryStore::new();
        store.seed_option(option("TRV1001", 10)).await;
        let mut reverse = option("TRV1002", 10);
        reverse.source = "Delhi".to_string();
        reverse.destination = "Mumbai".to_string();
        store.seed_option(reverse).await;

        assert_eq!(
            store.suggest_cities("i").await.unwrap(),
            vec!["Delhi".to_string(), "Mumbai".to_string()]
        );
        assert_eq!(
            store.suggest_cities("mum").await.unwrap(),
            vec!["Mumbai".to_string()]
        );
    }
}
