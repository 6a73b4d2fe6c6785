//! SignLab Deterministic Simulation Harness
//!
//! This crate runs the signature engine inside a controlled environment
//! where every source of non-determinism is intercepted:
//! - **Time**: a virtual clock that only moves when the engine sleeps
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! A scenario run is therefore a pure function of (seed, scenario): the
//! same inputs reproduce the same key pairs, the same signatures, and the
//! same narrated event log, byte for byte.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                     │
//! │  ┌──────────────┐      ┌─────────────────────────────┐ │
//! │  │  ScenarioId  │─────►│  Simulation (signlab_core)  │ │
//! │  │   catalog    │      │  keygen → sign → verify     │ │
//! │  └──────────────┘      └──────────────┬──────────────┘ │
//! │                                       │                │
//! │                              ┌────────▼─────────┐      │
//! │                              │      SimEnv      │      │
//! │                              │  virtual clock + │      │
//! │                              │  seeded ChaCha8  │      │
//! │                              └──────────────────┘      │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use signlab_sim::scenarios::ScenarioId;
//! use signlab_sim::ScenarioRunner;
//!
//! let runner = ScenarioRunner::new(42);
//! let result = runner.run(ScenarioId::CombinedAttacks).await;
//! assert!(result.passed);
//! ```

mod env;
mod runner;
mod transcript;
pub mod scenarios;

pub use env::SimEnv;
pub use runner::{ScenarioResult, ScenarioRunner};
pub use transcript::{RunTranscript, TranscriptEntry};
