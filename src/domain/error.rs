use thiserror::Error;

/// Errors raised by the chain engine itself.
///
/// A request that fails is not an error here: request outcomes travel as a
/// plain success flag and end up in the aggregate result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Request chain has no requests")]
    EmptyChain,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Chain run interrupted: {message}")]
    Interrupted { message: String },
}

impl ChainError {
    pub fn empty_chain() -> Self {
        Self::EmptyChain
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted {
            message: message.into(),
        }
    }
}
