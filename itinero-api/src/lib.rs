use axum::{http::Method, middleware::from_fn_with_state, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod accounts;
pub mod admin;
pub mod bookings;
pub mod error;
pub mod middleware;
pub mod search;
pub mod state;

pub use state::{AppState, AuthConfig};

use crate::middleware::auth::{admin_auth_middleware, customer_auth_middleware};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new().merge(accounts::routes()).merge(search::routes());

    let customer = Router::new()
        .merge(accounts::protected_routes())
        .merge(bookings::routes())
        .layer(from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .merge(admin::routes())
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
