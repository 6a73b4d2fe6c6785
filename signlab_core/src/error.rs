//! Error taxonomy for the signature engine.

use thiserror::Error;

use signlab_env::EnvError;

use crate::orchestrator::RunState;

/// Errors from the crypto provider.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RSA key pair generation failed (entropy or parameter trouble)
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Producing a signature failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Verification input was structurally malformed (empty or
    /// wrong-length signature). A well-formed signature that simply does
    /// not verify is `Ok(false)`, never this error.
    #[error("Malformed verification input: {0}")]
    VerificationInput(String),
}

impl CryptoError {
    /// Creates a key generation error.
    pub fn key_generation(msg: impl Into<String>) -> Self {
        Self::KeyGeneration(msg.into())
    }

    /// Creates a signing error.
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Creates a verification input error.
    pub fn verification_input(msg: impl Into<String>) -> Self {
        Self::VerificationInput(msg.into())
    }
}

/// Errors surfaced by the orchestrator's entry points.
#[derive(Debug, Error)]
pub enum SimError {
    /// Entry point called in a state that does not allow it
    #[error("Operation not allowed in state {state:?}: {reason}")]
    Precondition {
        /// State the orchestrator was in when the call arrived
        state: RunState,
        /// What was missing or in flight
        reason: &'static str,
    },

    /// Provider failure during provisioning or a run
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Environment failure (entropy source)
    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Errors from key/signature export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// PEM encoding failed
    #[error("PEM encoding failed: {0}")]
    Pem(String),

    /// Filesystem write failed
    #[error("Export io error: {0}")]
    Io(#[from] std::io::Error),
}
