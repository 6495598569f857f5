use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid pipeline configuration. Fatal at startup, never produced at
    /// runtime.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
