use thiserror::Error;

/// Error kinds surfaced by the core engine (spec §7).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bazel error: {0}")]
    Bazel(String),

    #[error("{0}")]
    Custom(String),

    #[error("jsonrpc error: {code}: {message}")]
    JsonRpc { code: i64, message: String },
}

impl EngineError {
    pub fn custom(msg: impl Into<String>) -> Self {
        EngineError::Custom(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
