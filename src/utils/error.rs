use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("duplicate product: {0}")]
    Duplicate(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("gave up after {attempts} attempts: {source}")]
    Terminal {
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("invalid extraction rule: {0}")]
    Rule(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Transient errors are fed back into the backoff loop; everything
    /// else crosses the component boundary unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Render(_) | EngineError::Extraction(_) | EngineError::Parse(_)
        )
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;
