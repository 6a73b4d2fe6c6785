//! Production implementation of LabEnv using Tokio.

use crate::{EnvError, LabEnv};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Production environment backed by Tokio and OS entropy.
///
/// This is the "real" implementation used outside of tests. Time comes
/// from the system clock, every derived RNG is freshly seeded from OsRng.
pub struct TokioEnv {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioEnv {
    /// Creates a new TokioEnv.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped environment for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LabEnv for TokioEnv {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn derive_rng(&self, _stream: u64) -> Result<ChaCha8Rng, EnvError> {
        // In production, every consumer gets fresh OS entropy
        ChaCha8Rng::from_rng(rand::rngs::OsRng).map_err(|e| EnvError::entropy(e.to_string()))
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[tokio::test]
    async fn test_tokio_env_time() {
        let env = TokioEnv::new();
        let t1 = env.now();
        env.sleep(Duration::from_millis(10)).await;
        let t2 = env.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_tokio_env_rng_is_fresh() {
        let env = TokioEnv::new();
        let mut r1 = env.derive_rng(1).unwrap();
        let mut r2 = env.derive_rng(1).unwrap();

        // Same stream, but production entropy is fresh every call
        assert_ne!(r1.next_u64(), r2.next_u64());
    }

    #[test]
    fn test_tokio_env_seed() {
        let env = TokioEnv::new();
        assert_eq!(env.seed(), 0);
    }
}
