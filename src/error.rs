use serde::Serialize;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes as `{ error, kind }` so callers can tell recurrence problems
/// apart from storage problems.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A recurrence rule is missing the `day`/`month` its kind requires,
    /// or carries an out-of-range value.
    #[error("Invalid recurrence rule: {0}")]
    RuleValidation(String),

    /// A recurring bill has no computable successor (e.g. `custom`).
    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    /// Failure reported by the calendar adapter. Never fatal to the
    /// operation that triggered the sync.
    #[error("Calendar sync error: {0}")]
    Calendar(String),

    /// Another run of the same job is still in progress.
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Pool(_) => "pool",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::RuleValidation(_) => "rule_validation",
            AppError::InvalidRecurrence(_) => "invalid_recurrence",
            AppError::Calendar(_) => "calendar",
            AppError::Busy(_) => "busy",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Serde(_) => "serde",
            AppError::Toml(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// True for failures of the bill store, where retrying may succeed.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Pool(_) | AppError::NotFound(_)
        )
    }

    /// True for failures the user fixes by editing the recurrence settings.
    pub fn is_recurrence(&self) -> bool {
        matches!(
            self,
            AppError::RuleValidation(_) | AppError::InvalidRecurrence(_)
        )
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}
