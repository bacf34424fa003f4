use thiserror::Error;

use tb_compiler::CompileError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No rule set has been loaded, or all were cleared.
    #[error("Please initialise the engine by loading a set of rules into it first")]
    Uninitialized,

    #[error("failed to compile rules: {0}")]
    Compile(#[from] CompileError),

    #[error("URL does not contain a host: {0:?}")]
    InvalidUrl(String),

    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}
