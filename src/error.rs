use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Collector error: {message}")]
    Source { message: String },

    #[error("{layer} stage failed for '{path}': {message}")]
    Stage {
        layer: &'static str,
        path: String,
        message: String,
    },
}

impl PipelineError {
    /// Wrap an artifact read/write failure with its stage context.
    pub fn stage(
        layer: &'static str,
        path: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        PipelineError::Stage {
            layer,
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
