/// A request violated one specific business rule. The variant tells the
/// caller exactly which rule; no state was changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Source and destination cannot be the same")]
    SameSourceAndDestination,

    #[error("Date cannot be in the past")]
    DateInPast,

    #[error("Min price cannot be greater than max price")]
    PriceRangeInverted,

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Price must be positive")]
    NonPositivePrice,

    #[error("Total seats must be between 1 and 500")]
    TotalSeatsOutOfRange,

    #[error("Available seats cannot exceed total seats")]
    AvailableExceedsTotal,

    #[error("Departure date cannot be after arrival date")]
    DepartureAfterArrival,

    #[error("Must book at least 1 seat")]
    NoSeatsRequested,

    #[error("Cannot book more than 10 seats")]
    TooManySeats,

    #[error("Only {available} seats available")]
    InsufficientSeats { available: u32 },

    #[error("Username must be between 3 and 150 characters")]
    InvalidUsername,
}

/// Failures surfaced by a repository implementation.
///
/// `Conflict` marks a transient lost-update race that survived the store's
/// bounded retries; callers may safely resubmit. Everything else is
/// per-request and final.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("concurrent update conflict, try again")]
    Conflict,

    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("storage backend error: {0}")]
    Backend(String),
}
