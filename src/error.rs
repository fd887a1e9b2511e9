use thiserror::Error;

/// Failures raised by the derivation engine.
///
/// The three kinds stay distinct all the way to the caller so a consumer can
/// tell "no R69 data" apart from "bad data".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed or contradictory input: non-monotonic clock, tied final, score-at-69 != 69.
    #[error("data integrity error in game {game_id}: {detail}")]
    DataIntegrity { game_id: String, detail: String },

    /// The operation was requested before its preconditions hold.
    #[error("invalid state for game {game_id}: {detail}")]
    InvalidState { game_id: String, detail: String },

    /// A derived field cannot be computed from the given inputs.
    #[error("{field} unavailable: {reason}")]
    Unavailable { field: &'static str, reason: String },
}

impl EngineError {
    pub fn data_integrity(game_id: &str, detail: impl Into<String>) -> Self {
        EngineError::DataIntegrity {
            game_id: game_id.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid_state(game_id: &str, detail: impl Into<String>) -> Self {
        EngineError::InvalidState {
            game_id: game_id.to_string(),
            detail: detail.into(),
        }
    }

    /// Stable label used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::DataIntegrity { .. } => "data_integrity",
            EngineError::InvalidState { .. } => "invalid_state",
            EngineError::Unavailable { .. } => "unavailable",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(EngineError::data_integrity("g1", "x").kind(), "data_integrity");
        assert_eq!(EngineError::invalid_state("g1", "x").kind(), "invalid_state");
        let unavailable = EngineError::Unavailable {
            field: "swing_margin",
            reason: "no events".to_string(),
        };
        assert_eq!(unavailable.kind(), "unavailable");
        assert_eq!(unavailable.to_string(), "swing_margin unavailable: no events");
    }

    #[test]
    fn engine_error_converts_into_app_error() {
        let app: AppError = EngineError::invalid_state("g7", "not final").into();
        assert!(matches!(app, AppError::Engine(EngineError::InvalidState { .. })));
        assert_eq!(app.to_string(), "Engine error: invalid state for game g7: not final");
    }
}
