use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const MIN_TOTAL_SEATS: u32 = 1;
pub const MAX_TOTAL_SEATS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Flight,
    Train,
    Bus,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Flight => "flight",
            TravelMode::Train => "train",
            TravelMode::Bus => "bus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flight" => Some(TravelMode::Flight),
            "train" => Some(TravelMode::Train),
            "bus" => Some(TravelMode::Bus),
            _ => None,
        }
    }
}

/// A bookable travel option with seat capacity.
///
/// `available_seats` is the single contended counter in the system. It is
/// mutated only by booking creation (decrement) and cancellation (increment),
/// and the stores keep `0 <= available_seats <= total_seats` under a row
/// lock or mutex for the whole read-validate-write span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelOption {
    pub id: Uuid,
    pub travel_code: String,
    pub mode: TravelMode,
    pub source: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: NaiveDate,
    pub arrival_time: NaiveTime,
    /// Price per seat in minor currency units.
    pub price_minor: i64,
    pub total_seats: u32,
    pub available_seats: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TravelOption {
    /// Check the catalog invariants for a new option. `today` is the
    /// caller's current date; options may not be created in the past.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if same_city(&self.source, &self.destination) {
            return Err(ValidationError::SameSourceAndDestination);
        }
        if self.departure_date < today {
            return Err(ValidationError::DateInPast);
        }
        if self.departure_date > self.arrival_date {
            return Err(ValidationError::DepartureAfterArrival);
        }
        if self.price_minor <= 0 {
            return Err(ValidationError::NonPositivePrice);
        }
        if self.total_seats < MIN_TOTAL_SEATS || self.total_seats > MAX_TOTAL_SEATS {
            return Err(ValidationError::TotalSeatsOutOfRange);
        }
        if self.available_seats > self.total_seats {
            return Err(ValidationError::AvailableExceedsTotal);
        }
        Ok(())
    }

    /// Take `seats` out of availability. Fails without mutating when fewer
    /// than `seats` remain.
    pub fn reserve_seats(&mut self, seats: u32) -> Result<(), ValidationError> {
        crate::booking::validate_seat_count(seats, self.available_seats)?;
        self.available_seats -= seats;
        Ok(())
    }

    /// Return `seats` to availability, the inverse of [`reserve_seats`].
    /// Capped at `total_seats` so the counter invariant holds even against
    /// a corrupted row.
    ///
    /// [`reserve_seats`]: TravelOption::reserve_seats
    pub fn release_seats(&mut self, seats: u32) {
        self.available_seats = (self.available_seats + seats).min(self.total_seats);
    }
}

/// Case-insensitive same-city check used by both catalog validation and
/// search filter validation.
pub fn same_city(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Parse a decimal price string ("8500", "8500.00", "8500.5") into minor
/// currency units. Rejects more than two fractional digits.
pub fn parse_price_minor(s: &str) -> Result<i64, ValidationError> {
    let s = s.trim();
    let invalid = || ValidationError::InvalidPrice(s.to_string());

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    if whole < 0 {
        return Err(invalid());
    }
    let frac_minor: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => frac.parse().map_err(|_| invalid())?,
    };
    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac_minor))
        .ok_or_else(invalid)
}

/// Render minor units back as a two-decimal price string.
pub fn format_price_minor(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn option(source: &str, destination: &str) -> TravelOption {
        let now = Utc::now();
        TravelOption {
            id: Uuid::new_v4(),
            travel_code: "TRV1001".to_string(),
            mode: TravelMode::Flight,
            source: source.to_string(),
            destination: destination.to_string(),
            departure_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            departure_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            arrival_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            price_minor: 850_000,
            total_seats: 60,
            available_seats: 50,
            created_at: now,
            updated_at: now,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[test]
    fn valid_option_passes() {
        assert!(option("Mumbai", "Delhi").validate(today()).is_ok());
    }

    #[test]
    fn same_city_rejected_case_insensitively() {
        let err = option("Mumbai", "mumbai").validate(today()).unwrap_err();
        assert_eq!(err, ValidationError::SameSourceAndDestination);
    }

    #[test]
    fn past_departure_rejected() {
        let mut opt = option("Mumbai", "Delhi");
        opt.departure_date = NaiveDate::from_ymd_opt(2029, 12, 31).unwrap();
        opt.arrival_date = opt.departure_date;
        assert_eq!(
            opt.validate(today()).unwrap_err(),
            ValidationError::DateInPast
        );
    }

    #[test]
    fn departure_after_arrival_rejected() {
        let mut opt = option("Mumbai", "Delhi");
        opt.arrival_date = NaiveDate::from_ymd_opt(2030, 5, 31).unwrap();
        assert_eq!(
            opt.validate(today()).unwrap_err(),
            ValidationError::DepartureAfterArrival
        );
    }

    #[test]
    fn seat_bounds_enforced() {
        let mut opt = option("Mumbai", "Delhi");
        opt.total_seats = 501;
        assert_eq!(
            opt.validate(today()).unwrap_err(),
            ValidationError::TotalSeatsOutOfRange
        );

        let mut opt = option("Mumbai", "Delhi");
        opt.total_seats = 40;
        assert_eq!(
            opt.validate(today()).unwrap_err(),
            ValidationError::AvailableExceedsTotal
        );
    }

    #[test]
    fn reserve_and_release_lifecycle() {
        let mut opt = option("Mumbai", "Delhi");
        opt.reserve_seats(2).unwrap();
        assert_eq!(opt.available_seats, 48);

        opt.release_seats(2);
        assert_eq!(opt.available_seats, 50);

        // Release never pushes past total_seats.
        opt.release_seats(100);
        assert_eq!(opt.available_seats, opt.total_seats);
    }

    #[test]
    fn reserve_fails_without_mutation_when_insufficient() {
        let mut opt = option("Mumbai", "Delhi");
        opt.available_seats = 1;
        let err = opt.reserve_seats(2).unwrap_err();
        assert_eq!(err, ValidationError::InsufficientSeats { available: 1 });
        assert_eq!(opt.available_seats, 1);
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price_minor("8500.00").unwrap(), 850_000);
        assert_eq!(parse_price_minor("8500").unwrap(), 850_000);
        assert_eq!(parse_price_minor("8500.5").unwrap(), 850_050);
        assert_eq!(parse_price_minor(" 120.99 ").unwrap(), 12_099);
        assert!(parse_price_minor("12.345").is_err());
        assert!(parse_price_minor("-5").is_err());
        assert!(parse_price_minor("abc").is_err());
        assert!(parse_price_minor("").is_err());
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price_minor(850_000), "8500.00");
        assert_eq!(format_price_minor(12_099), "120.99");
        assert_eq!(format_price_minor(5), "0.05");
    }

    #[test]
    fn mode_round_trips() {
        for mode in [TravelMode::Flight, TravelMode::Train, TravelMode::Bus] {
            assert_eq!(TravelMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(TravelMode::parse("boat"), None);
    }
}
