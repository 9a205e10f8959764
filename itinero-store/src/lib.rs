pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod user_repo;

pub use booking_repo::PgBookingRepository;
pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use user_repo::PgUserRepository;

use itinero_core::error::RepositoryError;

/// Map a sqlx failure onto the repository taxonomy: serialization failures
/// and deadlocks (SQLSTATE 40001/40P01) become retryable conflicts,
/// unique-key violations (23505) become duplicates, anything else is an
/// opaque backend fault.
pub(crate) fn map_sqlx_err(e: sqlx::Error) -> RepositoryError {
    if let Some(db) = e.as_database_error() {
        if let Some(code) = db.code() {
            match code.as_ref() {
                "40001" | "40P01" => return RepositoryError::Conflict,
                "23505" => return RepositoryError::Duplicate("record"),
                _ => {}
            }
        }
    }
    RepositoryError::Backend(e.to_string())
}
