//! Simulation orchestrator: the A → B exchange state machine.
//!
//! ```text
//!   Idle ──provision_keys──▶ KeysGenerating ──▶ KeysReady
//!                                  │
//!                                  └─(failure: keys unchanged, prior state)
//!
//!   KeysReady/Complete/Failed ──run_scenario──▶
//!       Hashing ▶ Signing ▶ Transmitting ▶ Verifying ▶ Complete
//!                      │            │           │
//!                      └────────────┴───────────┴──(error)──▶ Failed
//! ```
//!
//! The orchestrator owns the event log and both principals' key pairs,
//! drives an injected [`CryptoProvider`], and narrates every stage of the
//! exchange. All nondeterminism (keys, salts, corruption offsets, pacing,
//! timestamps) flows through the injected [`LabEnv`], so a seeded
//! environment makes whole runs reproducible.

use std::sync::Arc;
use std::time::Duration;

use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use signlab_env::LabEnv;

use crate::attack::{corrupt_signature, tamper_message};
use crate::config::{AttackKind, ScenarioConfig, SignatureScheme};
use crate::error::{CryptoError, SimError};
use crate::export::signature_base64;
use crate::log::{Actor, EventLog, LogLevel};
use crate::provider::{CryptoProvider, KeyPair, MessageDigest, Principal, RsaProvider};

/// Hex characters of a digest shown in narration (full value is retained).
const DIGEST_PREVIEW: usize = 16;
/// Base64 characters of a signature shown in narration.
const SIG_PREVIEW: usize = 32;
/// Base for per-run corruption RNG streams.
const CORRUPT_STREAM_BASE: u64 = 0x2000;

/// Lifecycle of the orchestrator across provisioning and runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No keys provisioned yet
    Idle,
    /// Key provisioning in flight
    KeysGenerating,
    /// Both principals hold key pairs; ready to run
    KeysReady,
    /// Run: hashing the outgoing message
    Hashing,
    /// Run: producing the signature
    Signing,
    /// Run: the envelope is crossing the channel
    Transmitting,
    /// Run: B is checking the signature
    Verifying,
    /// Run finished with a recorded outcome
    Complete,
    /// Run aborted on an unexpected error; the outcome stays unset
    Failed,
}

impl RunState {
    /// True while provisioning or a run is in flight; entry points refuse
    /// to start then.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::KeysGenerating
                | Self::Hashing
                | Self::Signing
                | Self::Transmitting
                | Self::Verifying
        )
    }

    /// Terminal states of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// What the signer produced during one run.
#[derive(Debug, Clone)]
pub struct SigningArtifact {
    /// SHA-256 of the original (pre-tamper) message
    pub digest: MessageDigest,
    /// Signature bytes as produced by the signer, before any attack
    pub signature: Vec<u8>,
    /// Scheme the signature was produced under
    pub scheme: SignatureScheme,
}

/// What actually crossed the simulated channel.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Message as received by B (tampered if that attack was armed)
    pub message: String,
    /// Signature as received by B (corrupted if that attack was armed)
    pub signature: Vec<u8>,
}

/// Result of B's verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Whether the signature verified over the received message
    pub verified: bool,
    /// Whose public key B used (B's own when the swap attack was armed)
    pub used_key: Principal,
}

/// The simulation orchestrator.
///
/// Entry points take `&mut self`, so overlapping runs on one instance are
/// unrepresentable; the [`RunState::is_busy`] guard additionally rejects
/// entry after a cancelled run (a future dropped mid-await) left a stale
/// in-flight state behind.
pub struct Simulation<E: LabEnv, P: CryptoProvider> {
    env: Arc<E>,
    provider: Arc<P>,
    state: RunState,
    log: EventLog,
    keys_a: Option<KeyPair>,
    keys_b: Option<KeyPair>,
    artifact: Option<SigningArtifact>,
    envelope: Option<Envelope>,
    outcome: Option<VerificationOutcome>,
    /// Presentation delay between pipeline stages
    pace: Duration,
    /// Runs started on this instance (separates corruption RNG streams)
    runs: u64,
}

impl<E: LabEnv> Simulation<E, RsaProvider<E>> {
    /// Creates an orchestrator with the real RSA provider.
    pub fn new(env: Arc<E>) -> Self {
        let provider = Arc::new(RsaProvider::new(Arc::clone(&env)));
        Self::with_provider(env, provider)
    }
}

impl<E: LabEnv, P: CryptoProvider> Simulation<E, P> {
    /// Creates an orchestrator with an injected provider.
    pub fn with_provider(env: Arc<E>, provider: Arc<P>) -> Self {
        Self {
            env,
            provider,
            state: RunState::Idle,
            log: EventLog::new(),
            keys_a: None,
            keys_b: None,
            artifact: None,
            envelope: None,
            outcome: None,
            pace: Duration::ZERO,
            runs: 0,
        }
    }

    /// Sets the presentation delay inserted between pipeline stages.
    ///
    /// Scheduling only; outcomes never depend on it. The CLI uses this to
    /// pace the narration for a human reader.
    pub fn with_pacing(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    // ==== Entry points ====

    /// Generates fresh key pairs for both principals concurrently.
    ///
    /// Either both principals end up with new pairs or neither does; on
    /// failure the previous keys (if any) are untouched and the state
    /// returns to its pre-call value.
    pub async fn provision_keys(&mut self, config: &ScenarioConfig) -> Result<(), SimError> {
        self.guard_not_busy("provision keys")?;

        let prior = self.state;
        self.set_state(RunState::KeysGenerating);
        self.narrate(
            Actor::System,
            LogLevel::Info,
            format!(
                "Generating {}-bit RSA key pairs using {}...",
                config.key_bits.bit_len(),
                config.scheme
            ),
        );

        // RSA generation is CPU-bound; run both off the async thread and
        // in parallel. Each call derives its own RNG stream, so scheduling
        // order cannot leak into the key material.
        let scheme = config.scheme;
        let bits = config.key_bits;
        let task_a = {
            let provider = Arc::clone(&self.provider);
            tokio::task::spawn_blocking(move || {
                provider.generate_keypair(scheme, bits, Principal::A)
            })
        };
        let task_b = {
            let provider = Arc::clone(&self.provider);
            tokio::task::spawn_blocking(move || {
                provider.generate_keypair(scheme, bits, Principal::B)
            })
        };
        let (res_a, res_b) = tokio::join!(task_a, task_b);

        let generated = flatten_keygen(res_a).and_then(|a| flatten_keygen(res_b).map(|b| (a, b)));
        match generated {
            Ok((a, b)) => {
                // Replace only once both pairs exist
                self.keys_a = Some(a);
                self.keys_b = Some(b);
                self.narrate(
                    Actor::A,
                    LogLevel::Success,
                    "Generated key pair (public + private)",
                );
                self.narrate(
                    Actor::B,
                    LogLevel::Success,
                    "Generated key pair (public + private)",
                );
                self.narrate(
                    Actor::System,
                    LogLevel::Success,
                    "Key generation complete. Both users have their key pairs.",
                );
                self.set_state(RunState::KeysReady);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "key provisioning failed");
                self.narrate(
                    Actor::System,
                    LogLevel::Error,
                    format!("Key generation failed: {}", err),
                );
                self.set_state(prior);
                Err(SimError::Crypto(err))
            }
        }
    }

    /// Runs the configured exchange end to end.
    ///
    /// Requires both principals to hold key pairs. A new run may start
    /// from `KeysReady`, `Complete`, or `Failed`; the previous run's
    /// artifact, envelope, and outcome are discarded first.
    pub async fn run_scenario(&mut self, config: &ScenarioConfig) -> Result<(), SimError> {
        self.guard_not_busy("run scenario")?;

        let (signer, key_a, key_b) = match (&self.keys_a, &self.keys_b) {
            (Some(a), Some(b)) => (a.private.clone(), a.public.clone(), b.public.clone()),
            _ => {
                self.narrate(
                    Actor::System,
                    LogLevel::Error,
                    "Keys not ready: generate key pairs before running the scenario.",
                );
                return Err(SimError::Precondition {
                    state: self.state,
                    reason: "both principals need key pairs",
                });
            }
        };

        // Snapshot: caller mutations after this point cannot affect the run
        let config = config.clone();
        self.artifact = None;
        self.envelope = None;
        self.outcome = None;
        self.runs += 1;

        match self.pipeline(&config, signer, key_a, key_b).await {
            Ok(()) => {
                self.set_state(RunState::Complete);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "run aborted");
                self.narrate(
                    Actor::System,
                    LogLevel::Error,
                    format!("Simulation failed: {}", err),
                );
                self.set_state(RunState::Failed);
                Err(err)
            }
        }
    }

    /// Clears the narration log and per-run display data.
    ///
    /// Callable in any state. Keys and the lifecycle state survive: a
    /// provisioned engine stays provisioned.
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.artifact = None;
        self.envelope = None;
        self.outcome = None;
    }

    // ==== Pipeline ====

    async fn pipeline(
        &mut self,
        config: &ScenarioConfig,
        signer: RsaPrivateKey,
        key_a: RsaPublicKey,
        key_b: RsaPublicKey,
    ) -> Result<(), SimError> {
        // A hashes the outgoing message
        self.set_state(RunState::Hashing);
        self.narrate(
            Actor::A,
            LogLevel::Info,
            format!("Computing SHA-256 hash of message: \"{}\"", config.message),
        );
        let digest = self.provider.digest(&config.message);
        self.narrate(
            Actor::A,
            LogLevel::Success,
            format!("Hash computed: {}...", digest_preview(&digest)),
        );
        self.step_pause().await;

        // A signs the original message
        self.set_state(RunState::Signing);
        self.narrate(
            Actor::A,
            LogLevel::Info,
            format!("Signing message with private key using {}...", config.scheme),
        );
        let signature = self.provider.sign(&signer, &config.message, config.scheme)?;

        let mut transmitted = signature.clone();
        if config.attacks.contains(AttackKind::CorruptSignature) {
            let mut rng = self.env.derive_rng(CORRUPT_STREAM_BASE + self.runs)?;
            let (corrupted, offsets) = corrupt_signature(&transmitted, &mut rng);
            transmitted = corrupted;
            self.narrate(
                Actor::Attacker,
                LogLevel::Error,
                format!(
                    "🔴 Corrupted signature bytes in transit! Flipped offsets: {:?}",
                    offsets
                ),
            );
        }
        self.narrate(
            Actor::A,
            LogLevel::Success,
            format!("Signature created: {}...", sig_preview(&transmitted)),
        );
        self.artifact = Some(SigningArtifact {
            digest,
            signature,
            scheme: config.scheme,
        });
        self.step_pause().await;

        // The envelope crosses the channel
        self.set_state(RunState::Transmitting);
        let mut envelope = Envelope {
            message: config.message.clone(),
            signature: transmitted,
        };
        if config.attacks.contains(AttackKind::TamperMessage) {
            envelope.message = tamper_message(&config.message);
            self.narrate(
                Actor::Attacker,
                LogLevel::Error,
                format!(
                    "🔴 Message tampered during transmission! New message: \"{}\"",
                    envelope.message
                ),
            );
        } else {
            self.narrate(
                Actor::System,
                LogLevel::Info,
                "Transmitting message and signature from A → B...",
            );
        }
        self.step_pause().await;

        // B receives and hashes what arrived
        self.narrate(
            Actor::B,
            LogLevel::Info,
            format!("Received message: \"{}\"", envelope.message),
        );
        self.narrate(
            Actor::B,
            LogLevel::Info,
            "Computing SHA-256 hash of received message...",
        );
        let received_digest = self.provider.digest(&envelope.message);
        self.narrate(
            Actor::B,
            LogLevel::Info,
            format!(
                "Hash of received message: {}...",
                digest_preview(&received_digest)
            ),
        );
        self.step_pause().await;

        // B verifies
        self.set_state(RunState::Verifying);
        let swap = config.attacks.contains(AttackKind::SwapKey);
        let (used_key, verify_key, key_label) = if swap {
            self.narrate(
                Actor::Attacker,
                LogLevel::Error,
                "🔴 Swapped A's public key with B's public key!",
            );
            (Principal::B, key_b, "B's (wrong)")
        } else {
            (Principal::A, key_a, "A's (correct)")
        };
        self.narrate(
            Actor::B,
            LogLevel::Info,
            format!("Verifying signature using {} public key...", key_label),
        );
        let verified = self.provider.verify(
            &verify_key,
            &envelope.message,
            &envelope.signature,
            config.scheme,
        )?;
        self.step_pause().await;

        self.outcome = Some(VerificationOutcome { verified, used_key });
        self.envelope = Some(envelope);
        if verified {
            self.narrate(
                Actor::B,
                LogLevel::Success,
                "✅ Signature is VALID! Message is authentic and untampered.",
            );
        } else {
            self.narrate(
                Actor::B,
                LogLevel::Error,
                "❌ Signature is INVALID! Message integrity or authenticity check failed.",
            );
            for kind in config.attacks.active() {
                self.narrate(
                    Actor::System,
                    LogLevel::Warning,
                    format!("Verification failed because {}.", kind.explanation()),
                );
            }
        }
        Ok(())
    }

    // ==== Observers ====

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The narration log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Outcome of the last completed run, if any.
    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        self.outcome.as_ref()
    }

    /// What the signer produced during the last run, if any.
    pub fn artifact(&self) -> Option<&SigningArtifact> {
        self.artifact.as_ref()
    }

    /// What crossed the channel during the last run, if any.
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// Digest of the last run's original message.
    pub fn digest(&self) -> Option<&MessageDigest> {
        self.artifact.as_ref().map(|a| &a.digest)
    }

    /// The last run's signature as produced by the signer.
    pub fn signature(&self) -> Option<&[u8]> {
        self.artifact.as_ref().map(|a| a.signature.as_slice())
    }

    /// Whether `principal` holds a complete key pair.
    pub fn has_keys(&self, principal: Principal) -> bool {
        self.key_pair(principal).is_some()
    }

    /// `principal`'s key pair, if provisioned.
    pub fn key_pair(&self, principal: Principal) -> Option<&KeyPair> {
        match principal {
            Principal::A => self.keys_a.as_ref(),
            Principal::B => self.keys_b.as_ref(),
        }
    }

    /// `principal`'s public key, if provisioned.
    pub fn public_key(&self, principal: Principal) -> Option<&RsaPublicKey> {
        self.key_pair(principal).map(|k| &k.public)
    }

    // ==== Internals ====

    fn guard_not_busy(&mut self, action: &'static str) -> Result<(), SimError> {
        if self.state.is_busy() {
            self.narrate(
                Actor::System,
                LogLevel::Error,
                format!("Cannot {}: an operation is already in flight.", action),
            );
            return Err(SimError::Precondition {
                state: self.state,
                reason: "an operation is already in flight",
            });
        }
        Ok(())
    }

    fn narrate(&mut self, actor: Actor, level: LogLevel, text: impl Into<String>) {
        let timestamp = self.env.system_time();
        self.log.append(actor, level, text, timestamp);
    }

    fn set_state(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    async fn step_pause(&self) {
        if !self.pace.is_zero() {
            self.env.sleep(self.pace).await;
        }
    }
}

fn flatten_keygen(
    res: Result<Result<KeyPair, CryptoError>, tokio::task::JoinError>,
) -> Result<KeyPair, CryptoError> {
    match res {
        Ok(inner) => inner,
        Err(join_err) => Err(CryptoError::key_generation(format!(
            "generation task failed: {}",
            join_err
        ))),
    }
}

fn digest_preview(digest: &MessageDigest) -> String {
    let hex = digest.to_hex();
    hex[..DIGEST_PREVIEW.min(hex.len())].to_string()
}

fn sig_preview(signature: &[u8]) -> String {
    let b64 = signature_base64(signature);
    let cut = SIG_PREVIEW.min(b64.len());
    b64[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttackSet, KeyBits};
    use sha2::{Digest as _, Sha256};
    use signlab_env::TokioEnv;

    fn lab() -> Simulation<TokioEnv, RsaProvider<TokioEnv>> {
        Simulation::new(TokioEnv::shared())
    }

    fn attack_entries(sim: &Simulation<TokioEnv, RsaProvider<TokioEnv>>) -> usize {
        sim.log().entries_by_actor(Actor::Attacker).len()
    }

    fn warning_entries(sim: &Simulation<TokioEnv, RsaProvider<TokioEnv>>) -> usize {
        sim.log().entries_by_level(LogLevel::Warning).len()
    }

    #[tokio::test]
    async fn test_happy_path_verifies() {
        let mut sim = lab();
        let config = ScenarioConfig::default();

        sim.provision_keys(&config).await.unwrap();
        assert_eq!(sim.state(), RunState::KeysReady);
        assert!(sim.has_keys(Principal::A));
        assert!(sim.has_keys(Principal::B));

        sim.run_scenario(&config).await.unwrap();
        assert_eq!(sim.state(), RunState::Complete);

        let outcome = sim.outcome().unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.used_key, Principal::A);
        assert_eq!(attack_entries(&sim), 0);
        assert_eq!(warning_entries(&sim), 0);
    }

    #[tokio::test]
    async fn test_baseline_narration_shape() {
        let mut sim = lab();
        let config = ScenarioConfig::default();
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        let shape: Vec<(Actor, LogLevel)> = sim
            .log()
            .entries()
            .iter()
            .map(|e| (e.actor, e.level))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Actor::System, LogLevel::Info),
                (Actor::A, LogLevel::Success),
                (Actor::B, LogLevel::Success),
                (Actor::System, LogLevel::Success),
                (Actor::A, LogLevel::Info),
                (Actor::A, LogLevel::Success),
                (Actor::A, LogLevel::Info),
                (Actor::A, LogLevel::Success),
                (Actor::System, LogLevel::Info),
                (Actor::B, LogLevel::Info),
                (Actor::B, LogLevel::Info),
                (Actor::B, LogLevel::Info),
                (Actor::B, LogLevel::Info),
                (Actor::B, LogLevel::Success),
            ]
        );

        let entries = sim.log().entries();
        assert!(entries[0]
            .text
            .contains("2048-bit RSA key pairs using RSA-PSS"));
        assert!(entries[4].text.contains("Computing SHA-256 hash"));
        assert!(entries[8].text.contains("Transmitting"));
        assert!(entries[13].text.contains("VALID"));
    }

    #[tokio::test]
    async fn test_happy_path_pkcs1v15() {
        let mut sim = lab();
        let config = ScenarioConfig::default().with_scheme(SignatureScheme::Pkcs1v15);
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        assert!(sim.outcome().unwrap().verified);
        assert!(sim.log().find("RSASSA-PKCS1-v1_5").is_some());
    }

    #[tokio::test]
    async fn test_tampered_message_fails_verification() {
        let mut sim = lab();
        let config = ScenarioConfig::default().with_attack(AttackKind::TamperMessage);
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        assert_eq!(sim.state(), RunState::Complete);
        assert!(!sim.outcome().unwrap().verified);
        assert_eq!(attack_entries(&sim), 1);
        assert_eq!(warning_entries(&sim), 1);
        assert!(sim.log().find("tampered during transmission").is_some());

        // B received the marked message, but the artifact digest is over
        // the original text
        let envelope = sim.envelope().unwrap();
        assert!(envelope.message.ends_with(" [TAMPERED]"));
        let expected: [u8; 32] = Sha256::digest(config.message.as_bytes()).into();
        assert_eq!(sim.digest().unwrap().as_bytes(), &expected);
    }

    #[tokio::test]
    async fn test_swapped_key_uses_bs_key() {
        let mut sim = lab();
        let config = ScenarioConfig::default().with_attack(AttackKind::SwapKey);
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        let outcome = sim.outcome().unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.used_key, Principal::B);
        assert_eq!(attack_entries(&sim), 1);
        assert!(sim.log().find("wrong public key").is_some());
    }

    #[tokio::test]
    async fn test_corrupted_signature_detected() {
        let mut sim = lab();
        let config = ScenarioConfig::default().with_attack(AttackKind::CorruptSignature);
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        assert!(!sim.outcome().unwrap().verified);
        assert_eq!(attack_entries(&sim), 1);
        assert!(sim.log().find("Corrupted signature bytes").is_some());

        // Transmitted bytes differ from the as-signed artifact in exactly
        // the flipped positions
        let signed = sim.signature().unwrap();
        let transmitted = &sim.envelope().unwrap().signature;
        assert_eq!(signed.len(), transmitted.len());
        let differing = signed
            .iter()
            .zip(transmitted.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(differing, 3);
    }

    #[tokio::test]
    async fn test_all_attacks_compose() {
        let mut sim = lab();
        let config = ScenarioConfig {
            attacks: AttackSet::all(),
            ..ScenarioConfig::default()
        };
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        assert!(!sim.outcome().unwrap().verified);
        assert_eq!(attack_entries(&sim), 3);
        assert_eq!(warning_entries(&sim), 3);

        // Explanations come in canonical order: tamper, corrupt, swap
        let warnings: Vec<&str> = sim
            .log()
            .entries_by_level(LogLevel::Warning)
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert!(warnings[0].contains("tampered"));
        assert!(warnings[1].contains("corrupted"));
        assert!(warnings[2].contains("wrong public key"));
    }

    #[tokio::test]
    async fn test_pkcs1v15_deterministic_across_runs() {
        let mut sim = lab();
        let config = ScenarioConfig::default().with_scheme(SignatureScheme::Pkcs1v15);
        sim.provision_keys(&config).await.unwrap();

        sim.run_scenario(&config).await.unwrap();
        let first = sim.signature().unwrap().to_vec();
        sim.run_scenario(&config).await.unwrap();
        let second = sim.signature().unwrap().to_vec();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pss_differs_across_runs() {
        let mut sim = lab();
        let config = ScenarioConfig::default();
        sim.provision_keys(&config).await.unwrap();

        sim.run_scenario(&config).await.unwrap();
        assert!(sim.outcome().unwrap().verified);
        let first = sim.signature().unwrap().to_vec();

        sim.run_scenario(&config).await.unwrap();
        assert!(sim.outcome().unwrap().verified);
        let second = sim.signature().unwrap().to_vec();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_run_without_keys_is_precondition_error() {
        let mut sim = lab();
        let err = sim.run_scenario(&ScenarioConfig::default()).await.unwrap_err();

        assert!(matches!(err, SimError::Precondition { .. }));
        assert_eq!(sim.state(), RunState::Idle);
        assert_eq!(sim.log().len(), 1);
        let entry = &sim.log().entries()[0];
        assert_eq!(entry.actor, Actor::System);
        assert_eq!(entry.level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_clear_log_keeps_keys_and_state() {
        let mut sim = lab();
        let config = ScenarioConfig::default();
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();

        sim.clear_log();

        assert!(sim.log().is_empty());
        assert!(sim.digest().is_none());
        assert!(sim.signature().is_none());
        assert!(sim.outcome().is_none());
        assert!(sim.has_keys(Principal::A));
        assert!(sim.has_keys(Principal::B));
        assert_eq!(sim.state(), RunState::Complete);

        // Still runnable without re-provisioning
        sim.run_scenario(&config).await.unwrap();
        assert!(sim.outcome().unwrap().verified);
    }

    #[tokio::test]
    async fn test_reprovision_replaces_keys() {
        let mut sim = lab();
        let config = ScenarioConfig::default();
        sim.provision_keys(&config).await.unwrap();
        let before = crate::export::public_key_pem(sim.public_key(Principal::A).unwrap()).unwrap();

        sim.provision_keys(&config).await.unwrap();
        let after = crate::export::public_key_pem(sim.public_key(Principal::A).unwrap()).unwrap();

        assert_ne!(before, after);
        assert_eq!(sim.state(), RunState::KeysReady);
    }

    #[tokio::test]
    async fn test_empty_and_unicode_messages() {
        let mut sim = lab();
        let config = ScenarioConfig::default().with_message("");
        sim.provision_keys(&config).await.unwrap();
        sim.run_scenario(&config).await.unwrap();
        assert!(sim.outcome().unwrap().verified);

        let config = config.with_message("署名テスト 🔏 épreuve");
        sim.run_scenario(&config).await.unwrap();
        assert!(sim.outcome().unwrap().verified);
    }

    #[test]
    fn test_busy_and_terminal_states() {
        assert!(RunState::KeysGenerating.is_busy());
        assert!(RunState::Signing.is_busy());
        assert!(!RunState::Idle.is_busy());
        assert!(!RunState::Complete.is_busy());
        assert!(RunState::Complete.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Verifying.is_terminal());
    }

    // ==== Fault injection ====

    enum FailPoint {
        Keygen,
        Sign,
        Verify,
    }

    struct FaultyProvider {
        inner: RsaProvider<TokioEnv>,
        fail: FailPoint,
    }

    impl FaultyProvider {
        fn new(fail: FailPoint) -> Arc<Self> {
            Arc::new(Self {
                inner: RsaProvider::new(TokioEnv::shared()),
                fail,
            })
        }
    }

    impl CryptoProvider for FaultyProvider {
        fn generate_keypair(
            &self,
            scheme: SignatureScheme,
            bits: KeyBits,
            owner: Principal,
        ) -> Result<KeyPair, CryptoError> {
            match self.fail {
                FailPoint::Keygen => Err(CryptoError::key_generation("injected fault")),
                _ => self.inner.generate_keypair(scheme, bits, owner),
            }
        }

        fn digest(&self, message: &str) -> MessageDigest {
            self.inner.digest(message)
        }

        fn sign(
            &self,
            key: &RsaPrivateKey,
            message: &str,
            scheme: SignatureScheme,
        ) -> Result<Vec<u8>, CryptoError> {
            match self.fail {
                FailPoint::Sign => Err(CryptoError::signing("injected fault")),
                _ => self.inner.sign(key, message, scheme),
            }
        }

        fn verify(
            &self,
            key: &RsaPublicKey,
            message: &str,
            signature: &[u8],
            scheme: SignatureScheme,
        ) -> Result<bool, CryptoError> {
            match self.fail {
                FailPoint::Verify => Err(CryptoError::verification_input("injected fault")),
                _ => self.inner.verify(key, message, signature, scheme),
            }
        }
    }

    fn faulty_lab(fail: FailPoint) -> Simulation<TokioEnv, FaultyProvider> {
        Simulation::with_provider(TokioEnv::shared(), FaultyProvider::new(fail))
    }

    #[tokio::test]
    async fn test_keygen_failure_rolls_back() {
        let mut sim = faulty_lab(FailPoint::Keygen);
        let err = sim
            .provision_keys(&ScenarioConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SimError::Crypto(CryptoError::KeyGeneration(_))
        ));
        assert_eq!(sim.state(), RunState::Idle);
        assert!(!sim.has_keys(Principal::A));
        assert!(!sim.has_keys(Principal::B));
        assert!(sim.log().find("Key generation failed").is_some());
    }

    #[tokio::test]
    async fn test_sign_failure_aborts_run() {
        let mut sim = faulty_lab(FailPoint::Sign);
        let config = ScenarioConfig::default();
        sim.provision_keys(&config).await.unwrap();

        let err = sim.run_scenario(&config).await.unwrap_err();
        assert!(matches!(err, SimError::Crypto(CryptoError::Signing(_))));
        assert_eq!(sim.state(), RunState::Failed);
        assert!(sim.outcome().is_none());
        assert!(sim.log().find("Simulation failed").is_some());
    }

    #[tokio::test]
    async fn test_verify_input_failure_aborts_run() {
        let mut sim = faulty_lab(FailPoint::Verify);
        let config = ScenarioConfig::default();
        sim.provision_keys(&config).await.unwrap();

        let err = sim.run_scenario(&config).await.unwrap_err();
        assert!(matches!(
            err,
            SimError::Crypto(CryptoError::VerificationInput(_))
        ));
        assert_eq!(sim.state(), RunState::Failed);
        assert!(sim.outcome().is_none());

        // A fresh run from Failed works once the fault is gone: state
        // machine allows restarting from a terminal state
        assert!(sim.state().is_terminal());
    }
}
