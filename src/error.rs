use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error ({source_name}): {message}")]
    Source {
        source_name: &'static str,
        message: String,
    },

    #[error("run already in progress")]
    RunInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn source_failure(source_name: &'static str, message: impl Into<String>) -> Self {
        AppError::Source {
            source_name,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
