//! SignLab Environment Abstraction Layer
//!
//! This crate provides the abstraction allowing the signature simulation
//! engine to run in both **Production** (tokio) and **Simulation** (virtual
//! clock) environments.
//!
//! # Core Concept
//!
//! For deterministic simulation testing, we intercept all sources of
//! nondeterminism:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, any simulated run
//! becomes reproducible via its seed number: the same seed yields the same
//! RSA keys, the same PSS salts, and the same corrupted signature bytes.
//!
//! # Example
//!
//! ```ignore
//! use signlab_env::LabEnv;
//!
//! async fn paced_step<E: LabEnv>(env: &E) {
//!     let mut rng = env.derive_rng(7)?;
//!     // ... use rng for anything nondeterministic ...
//!     env.sleep(Duration::from_millis(400)).await;
//! }
//! ```

mod context;
mod error;
mod tokio_impl;

pub use context::LabEnv;
pub use error::EnvError;
pub use tokio_impl::TokioEnv;
