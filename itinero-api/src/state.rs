use std::sync::Arc;

use itinero_core::repository::{BookingRepository, CatalogRepository, UserRepository};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub users: Arc<dyn UserRepository>,
    pub auth: AuthConfig,
}
