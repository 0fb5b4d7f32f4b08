//! Error types for the focus protocol core.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

/// Stage-local validation failures. These block a single transition and
/// never touch persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Stage {stage} requires field '{field}'")]
    MissingField { stage: u8, field: &'static str },

    #[error("Field '{field}' out of range: {value} not in {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Reward preference '{label}' is not rated")]
    UnratedPreference { label: String },

    #[error("Session for user {user_id} is already completed")]
    SessionCompleted { user_id: String },
}

/// Failures of the atomic completion step. The session stays uncompleted
/// and the same submission may be retried.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion requires terminal stage {terminal}, session is at {current}")]
    NotAtTerminalStage { current: u8, terminal: u8 },

    #[error("Session for user {user_id} is already completed")]
    AlreadyCompleted { user_id: String },

    #[error("Terminal stage answers incomplete: {0}")]
    Incomplete(#[source] ValidationError),

    #[error("Completion commit failed: {0}")]
    Commit(#[source] DatabaseError),
}

/// Reward scheduling errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("No reward candidates for tier {tier}")]
    EmptyTier { tier: String },

    #[error("Duplicate reward id in catalog: {id}")]
    DuplicateRewardId { id: String },

    #[error("Stored schedule references unknown reward {reward_id}")]
    UnknownReward { reward_id: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
