use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use itinero_core::catalog::{format_price_minor, parse_price_minor, TravelMode, TravelOption};
use itinero_core::search::SearchFilters;

use crate::error::AppError;
use crate::state::AppState;

const SIMILAR_OPTIONS_LIMIT: u32 = 5;
const MIN_CITY_QUERY_LEN: usize = 2;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub mode: Option<String>,
    pub date: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TravelOptionResponse {
    pub travel_code: String,
    pub mode: TravelMode,
    pub source: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_date: NaiveDate,
    pub arrival_time: NaiveTime,
    pub price: String,
    pub price_minor: i64,
    pub total_seats: u32,
    pub available_seats: u32,
}

impl From<TravelOption> for TravelOptionResponse {
    fn from(option: TravelOption) -> Self {
        TravelOptionResponse {
            travel_code: option.travel_code,
            mode: option.mode,
            source: option.source,
            destination: option.destination,
            departure_date: option.departure_date,
            departure_time: option.departure_time,
            arrival_date: option.arrival_date,
            arrival_time: option.arrival_time,
            price: format_price_minor(option.price_minor),
            price_minor: option.price_minor,
            total_seats: option.total_seats,
            available_seats: option.available_seats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TravelOptionDetailResponse {
    pub option: TravelOptionResponse,
    pub similar: Vec<TravelOptionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CitiesQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub cities: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/travel-options", get(search_travel_options))
        .route("/v1/travel-options/{travel_code}", get(travel_option_detail))
        .route("/v1/cities", get(suggest_cities))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl SearchQuery {
    /// Turn raw query params into validated domain filters. Blank params
    /// count as absent, matching how browser forms submit empty fields.
    fn into_filters(self) -> Result<SearchFilters, AppError> {
        let mode = match non_blank(self.mode) {
            Some(raw) => Some(
                TravelMode::parse(&raw)
                    .ok_or_else(|| AppError::Validation(format!("Unknown travel mode: {}", raw)))?,
            ),
            None => None,
        };
        let date = match non_blank(self.date) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| AppError::Validation(format!("Invalid date: {}", raw)))?,
            ),
            None => None,
        };
        let min_price_minor = non_blank(self.min_price)
            .map(|raw| parse_price_minor(&raw))
            .transpose()?;
        let max_price_minor = non_blank(self.max_price)
            .map(|raw| parse_price_minor(&raw))
            .transpose()?;

        Ok(SearchFilters {
            source: non_blank(self.source),
            destination: non_blank(self.destination),
            mode,
            date,
            min_price_minor,
            max_price_minor,
        })
    }
}

async fn search_travel_options(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<TravelOptionResponse>>, AppError> {
    let filters = query.into_filters()?;
    let today = Utc::now().date_naive();
    filters.validate(today)?;

    let options = state.catalog.search_options(&filters, today).await?;
    Ok(Json(options.into_iter().map(Into::into).collect()))
}

async fn travel_option_detail(
    State(state): State<AppState>,
    Path(travel_code): Path<String>,
) -> Result<Json<TravelOptionDetailResponse>, AppError> {
    let option = state
        .catalog
        .get_option(&travel_code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No travel option {}", travel_code)))?;

    let today = Utc::now().date_naive();
    let similar = state
        .catalog
        .similar_options(&option, today, SIMILAR_OPTIONS_LIMIT)
        .await?;

    Ok(Json(TravelOptionDetailResponse {
        option: option.into(),
        similar: similar.into_iter().map(Into::into).collect(),
    }))
}

async fn suggest_cities(
    State(state): State<AppState>,
    Query(query): Query<CitiesQuery>,
) -> Result<Json<CitiesResponse>, AppError> {
    let q = query.q.trim();
    if q.chars().count() < MIN_CITY_QUERY_LEN {
        return Ok(Json(CitiesResponse { cities: vec![] }));
    }

    let cities = state.catalog.suggest_cities(q).await?;
    Ok(Json(CitiesResponse { cities }))
}
