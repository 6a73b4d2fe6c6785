//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The entropy source failed while seeding an RNG
    #[error("Entropy error: {0}")]
    Entropy(String),
}

impl EnvError {
    /// Creates an entropy error.
    pub fn entropy(msg: impl Into<String>) -> Self {
        Self::Entropy(msg.into())
    }
}
