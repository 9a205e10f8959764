use chrono::NaiveDate;
use serde::Deserialize;

use crate::catalog::{same_city, TravelMode};
use crate::error::ValidationError;

/// Optional, conjunctive search filters over the catalog. Blank strings
/// count as absent. Search itself always restricts to future departures
/// with seats available.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchFilters {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub mode: Option<TravelMode>,
    pub date: Option<NaiveDate>,
    pub min_price_minor: Option<i64>,
    pub max_price_minor: Option<i64>,
}

impl SearchFilters {
    pub fn source(&self) -> Option<&str> {
        non_blank(self.source.as_deref())
    }

    pub fn destination(&self) -> Option<&str> {
        non_blank(self.destination.as_deref())
    }

    /// Reject invalid filter combinations before any query runs.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if let (Some(src), Some(dst)) = (self.source(), self.destination()) {
            if same_city(src, dst) {
                return Err(ValidationError::SameSourceAndDestination);
            }
        }
        if let Some(date) = self.date {
            if date < today {
                return Err(ValidationError::DateInPast);
            }
        }
        if let (Some(min), Some(max)) = (self.min_price_minor, self.max_price_minor) {
            if min > max {
                return Err(ValidationError::PriceRangeInverted);
            }
        }
        Ok(())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[test]
    fn empty_filters_are_valid() {
        assert!(SearchFilters::default().validate(today()).is_ok());
    }

    #[test]
    fn same_city_is_rejected_case_insensitively() {
        let filters = SearchFilters {
            source: Some("Mumbai".to_string()),
            destination: Some("mumbai".to_string()),
            ..Default::default()
        };
        assert_eq!(
            filters.validate(today()).unwrap_err(),
            ValidationError::SameSourceAndDestination
        );
    }

    #[test]
    fn blank_strings_count_as_absent() {
        let filters = SearchFilters {
            source: Some("  ".to_string()),
            destination: Some("".to_string()),
            ..Default::default()
        };
        assert!(filters.validate(today()).is_ok());
        assert_eq!(filters.source(), None);
        assert_eq!(filters.destination(), None);
    }

    #[test]
    fn past_date_is_rejected() {
        let filters = SearchFilters {
            date: Some(NaiveDate::from_ymd_opt(2029, 12, 31).unwrap()),
            ..Default::default()
        };
        assert_eq!(
            filters.validate(today()).unwrap_err(),
            ValidationError::DateInPast
        );
        // Today itself is fine.
        let filters = SearchFilters {
            date: Some(today()),
            ..Default::default()
        };
        assert!(filters.validate(today()).is_ok());
    }

    #[test]
    fn inverted_price_range_is_rejected() {
        let filters = SearchFilters {
            min_price_minor: Some(500_00),
            max_price_minor: Some(100_00),
            ..Default::default()
        };
        assert_eq!(
            filters.validate(today()).unwrap_err(),
            ValidationError::PriceRangeInverted
        );
    }
}
