//! Core environment trait for the signature lab.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, SystemTime};

use crate::EnvError;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the signature engine can
/// run in both production (tokio) and simulation (virtual clock, seeded
/// entropy) environments.
///
/// # Implementations
///
/// - **Production**: `TokioEnv` - wraps `tokio::time`, seeds RNGs from `OsRng`
/// - **Simulation**: `SimEnv` (in `signlab_sim`) - virtual clock, RNGs derived
///   from a master seed
///
/// # Determinism
///
/// Everything nondeterministic the engine does (RSA key generation, PSS
/// salts, corruption byte positions, pacing sleeps, log timestamps) flows
/// through this seam, so a simulated run is a pure function of the master
/// seed and the scenario configuration.
#[async_trait]
pub trait LabEnv: Send + Sync + 'static {
    /// Returns the current monotonic time since environment creation.
    ///
    /// Used for duration measurements. In simulation, this is the
    /// virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time for event log timestamps.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Derives a cryptographically seeded RNG for the given stream.
    ///
    /// In production the stream is ignored and the RNG is seeded from OS
    /// entropy; in simulation the RNG is derived from the master seed and
    /// `stream`, so the same (seed, stream) pair always yields the same
    /// byte sequence.
    ///
    /// # Arguments
    /// * `stream` - A caller-chosen value separating independent consumers
    ///   (key generation per principal, signing salts, corruption offsets)
    ///
    /// # Errors
    /// Returns [`EnvError::Entropy`] if the OS entropy source fails.
    fn derive_rng(&self, stream: u64) -> Result<ChaCha8Rng, EnvError>;

    /// Returns the environment's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
