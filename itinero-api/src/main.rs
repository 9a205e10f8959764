use std::net::SocketAddr;
use std::sync::Arc;

use itinero_api::{app, AppState, AuthConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itinero=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = itinero_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Itinero API on port {}", config.server.port);

    let db = itinero_store::DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let app_state = AppState {
        catalog: Arc::new(itinero_store::PgCatalogRepository::new(db.pool.clone())),
        bookings: Arc::new(itinero_store::PgBookingRepository::new(db.pool.clone())),
        users: Arc::new(itinero_store::PgUserRepository::new(db.pool.clone())),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
