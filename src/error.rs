//! Error types for the macro engine.

use thiserror::Error;

/// Common error type for the macro engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration, such as a craft loop template without a
    /// `{{macro}}` placeholder.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation not available for this kind of macro.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The Lua interpreter could not produce an entrypoint coroutine.
    #[error("script init error: {0}")]
    ScriptInit(String),

    /// Error raised while a Lua macro was running.
    #[error("script error: {0}")]
    ScriptRuntime(String),

    /// Malformed macro text.
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number of the offending line.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user supplied input, e.g. a config file.
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<mlua::Error> for EngineError {
    fn from(e: mlua::Error) -> Self {
        EngineError::ScriptRuntime(e.to_string())
    }
}

/// Result type alias for macro engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
