use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use itinero_core::catalog::{TravelMode, TravelOption};
use itinero_core::error::RepositoryError;
use itinero_core::repository::CatalogRepository;
use itinero_core::search::SearchFilters;

use crate::map_sqlx_err;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const OPTION_COLUMNS: &str = "id, travel_code, mode, source, destination, \
     departure_date, departure_time, arrival_date, arrival_time, \
     price_minor, total_seats, available_seats, created_at, updated_at";

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
pub(crate) struct TravelOptionRow {
    id: Uuid,
    travel_code: String,
    mode: String,
    source: String,
    destination: String,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    arrival_date: NaiveDate,
    arrival_time: NaiveTime,
    price_minor: i64,
    total_seats: i32,
    available_seats: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TravelOptionRow> for TravelOption {
    type Error = RepositoryError;

    fn try_from(row: TravelOptionRow) -> Result<Self, Self::Error> {
        let mode = TravelMode::parse(&row.mode)
            .ok_or_else(|| RepositoryError::Backend(format!("unknown travel mode: {}", row.mode)))?;
        Ok(TravelOption {
            id: row.id,
            travel_code: row.travel_code,
            mode,
            source: row.source,
            destination: row.destination,
            departure_date: row.departure_date,
            departure_time: row.departure_time,
            arrival_date: row.arrival_date,
            arrival_time: row.arrival_time,
            price_minor: row.price_minor,
            total_seats: row.total_seats.max(0) as u32,
            available_seats: row.available_seats.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape LIKE metacharacters in user input before wrapping it in `%`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn search_options(
        &self,
        filters: &SearchFilters,
        today: NaiveDate,
    ) -> Result<Vec<TravelOption>, RepositoryError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {OPTION_COLUMNS} FROM travel_options WHERE departure_date >= "
        ));
        qb.push_bind(today);
        qb.push(" AND available_seats > 0");

        if let Some(source) = filters.source() {
            qb.push(" AND source ILIKE ");
            qb.push_bind(like_pattern(source));
        }
        if let Some(destination) = filters.destination() {
            qb.push(" AND destination ILIKE ");
            qb.push_bind(like_pattern(destination));
        }
        if let Some(mode) = filters.mode {
            qb.push(" AND mode = ");
            qb.push_bind(mode.as_str());
        }
        if let Some(date) = filters.date {
            qb.push(" AND departure_date = ");
            qb.push_bind(date);
        }
        if let Some(min) = filters.min_price_minor {
            qb.push(" AND price_minor >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filters.max_price_minor {
            qb.push(" AND price_minor <= ");
            qb.push_bind(max);
        }
        qb.push(" ORDER BY departure_date, departure_time");

        let rows: Vec<TravelOptionRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        rows.into_iter().map(TravelOption::try_from).collect()
    }

    async fn get_option(
        &self,
        travel_code: &str,
    ) -> Result<Option<TravelOption>, RepositoryError> {
        let row: Option<TravelOptionRow> = sqlx::query_as(&format!(
            "SELECT {OPTION_COLUMNS} FROM travel_options WHERE travel_code = $1"
        ))
        .bind(travel_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(TravelOption::try_from).transpose()
    }

    async fn similar_options(
        &self,
        option: &TravelOption,
        today: NaiveDate,
        limit: u32,
    ) -> Result<Vec<TravelOption>, RepositoryError> {
        let rows: Vec<TravelOptionRow> = sqlx::query_as(&format!(
            "SELECT {OPTION_COLUMNS} FROM travel_options \
             WHERE source = $1 AND destination = $2 \
               AND departure_date >= $3 AND available_seats > 0 \
               AND travel_code <> $4 \
             ORDER BY departure_date, departure_time \
             LIMIT $5"
        ))
        .bind(&option.source)
        .bind(&option.destination)
        .bind(today)
        .bind(&option.travel_code)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(TravelOption::try_from).collect()
    }

    async fn suggest_cities(&self, query: &str) -> Result<Vec<String>, RepositoryError> {
        let pattern = like_pattern(query);
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT city FROM ( \
                 SELECT source AS city FROM travel_options \
                 UNION \
                 SELECT destination AS city FROM travel_options \
             ) cities WHERE city ILIKE $1 ORDER BY city",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows.into_iter().map(|(city,)| city).collect())
    }

    async fn insert_option(&self, option: &TravelOption) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO travel_options \
                 (id, travel_code, mode, source, destination, \
                  departure_date, departure_time, arrival_date, arrival_time, \
                  price_minor, total_seats, available_seats, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(option.id)
        .bind(&option.travel_code)
        .bind(option.mode.as_str())
        .bind(&option.source)
        .bind(&option.destination)
        .bind(option.departure_date)
        .bind(option.departure_time)
        .bind(option.arrival_date)
        .bind(option.arrival_time)
        .bind(option.price_minor)
        .bind(option.total_seats as i32)
        .bind(option.available_seats as i32)
        .bind(option.created_at)
        .bind(option.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_err(e) {
            RepositoryError::Duplicate(_) => RepositoryError::Duplicate("travel_code"),
            other => other,
        })?;

        Ok(())
    }
}
