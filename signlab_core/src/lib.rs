//! SignLab Core - Hash-Then-Sign RSA Signature Simulation Engine
//!
//! This library demonstrates why digital signatures work by letting them
//! fail on purpose:
//! 1. **Hash-then-sign**: A hashes a message (SHA-256), signs the digest
//!    with RSA-PSS or RSASSA-PKCS1-v1_5, and transmits both
//! 2. **Attack injection**: the channel can tamper with the message,
//!    corrupt signature bytes, or swap the verification key
//! 3. **Explainable outcomes**: an append-only event log narrates every
//!    step, and failed verifications carry one explanation per armed attack
//!
//! All nondeterminism flows through the [`signlab_env::LabEnv`] seam, so a
//! seeded environment reproduces entire runs byte-for-byte.

pub mod attack;
pub mod config;
pub mod error;
pub mod export;
pub mod log;
pub mod orchestrator;
pub mod provider;

// Re-export key types for convenience
pub use config::{AttackKind, AttackSet, KeyBits, ScenarioConfig, SignatureScheme, DEFAULT_MESSAGE};
pub use error::{CryptoError, ExportError, SimError};
pub use log::{Actor, EventLog, LogEntry, LogLevel};
pub use orchestrator::{
    Envelope, RunState, SigningArtifact, Simulation, VerificationOutcome,
};
pub use provider::{CryptoProvider, KeyPair, MessageDigest, Principal, RsaProvider};
