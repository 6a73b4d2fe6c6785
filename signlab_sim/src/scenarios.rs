//! Attack scenarios for the signature lab.

use signlab_core::{AttackKind, AttackSet, ScenarioConfig, SignatureScheme};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIG-001: Clean RSA-PSS exchange, no interference
    Baseline,

    /// SIG-002: Clean RSASSA-PKCS1-v1_5 exchange, repeatable signatures
    DeterministicScheme,

    // ═══════════════════════════════════════════════════
    // ADVERSARIAL SCENARIOS - The attacker is on the wire!
    // ═══════════════════════════════════════════════════

    /// SIG-003: Message altered between signing and verification
    TamperedMessage,

    /// SIG-004: Verifier handed the wrong public key
    SwappedKey,

    /// SIG-005: Signature bytes flipped in transit
    CorruptedSignature,

    /// SIG-006: All three attacks at once
    CombinedAttacks,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::DeterministicScheme,
            // Adversarial scenarios
            ScenarioId::TamperedMessage,
            ScenarioId::SwappedKey,
            ScenarioId::CorruptedSignature,
            ScenarioId::CombinedAttacks,
        ]
    }

    /// Returns clean scenarios (no attacker on the wire).
    pub fn clean() -> Vec<ScenarioId> {
        vec![ScenarioId::Baseline, ScenarioId::DeterministicScheme]
    }

    /// Returns adversarial scenarios only.
    pub fn adversarial() -> Vec<ScenarioId> {
        vec![
            ScenarioId::TamperedMessage,
            ScenarioId::SwappedKey,
            ScenarioId::CorruptedSignature,
            ScenarioId::CombinedAttacks,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::DeterministicScheme => "deterministic_scheme",
            // Adversarial
            ScenarioId::TamperedMessage => "tampered_message",
            ScenarioId::SwappedKey => "swapped_key",
            ScenarioId::CorruptedSignature => "corrupted_signature",
            ScenarioId::CombinedAttacks => "combined_attacks",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Clean RSA-PSS sign/verify round trip, expects VALID",
            ScenarioId::DeterministicScheme => {
                "PKCS#1 v1.5 round trip, same signature every run, expects VALID"
            }
            // Adversarial
            ScenarioId::TamperedMessage => {
                "🔴 Attacker appends a marker to the message in transit, expects INVALID"
            }
            ScenarioId::SwappedKey => {
                "🔴 Verifier uses B's public key instead of A's, expects INVALID"
            }
            ScenarioId::CorruptedSignature => {
                "🔴 Three signature bytes XOR-flipped in transit, expects INVALID"
            }
            ScenarioId::CombinedAttacks => {
                "🔴 Tamper + corrupt + swap all at once, expects INVALID"
            }
        }
    }

    /// Returns the engine configuration this scenario runs with.
    pub fn config(&self) -> ScenarioConfig {
        match self {
            ScenarioId::Baseline => ScenarioConfig::default(),
            ScenarioId::DeterministicScheme => {
                ScenarioConfig::default().with_scheme(SignatureScheme::Pkcs1v15)
            }
            // Adversarial
            ScenarioId::TamperedMessage => {
                ScenarioConfig::default().with_attack(AttackKind::TamperMessage)
            }
            ScenarioId::SwappedKey => ScenarioConfig::default().with_attack(AttackKind::SwapKey),
            ScenarioId::CorruptedSignature => {
                ScenarioConfig::default().with_attack(AttackKind::CorruptSignature)
            }
            ScenarioId::CombinedAttacks => ScenarioConfig {
                attacks: AttackSet::all(),
                ..ScenarioConfig::default()
            },
        }
    }

    /// Returns the verification verdict the scenario must end with.
    pub fn expected_verified(&self) -> bool {
        self.config().attacks.is_empty()
    }

    /// Returns true if an attacker is active in this scenario.
    pub fn is_adversarial(&self) -> bool {
        matches!(
            self,
            ScenarioId::TamperedMessage
                | ScenarioId::SwappedKey
                | ScenarioId::CorruptedSignature
                | ScenarioId::CombinedAttacks
        )
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "sig-001" => Ok(ScenarioId::Baseline),
            "deterministic_scheme" | "pkcs1v15" | "sig-002" => Ok(ScenarioId::DeterministicScheme),
            // Adversarial
            "tampered_message" | "tamper" | "sig-003" => Ok(ScenarioId::TamperedMessage),
            "swapped_key" | "swap" | "sig-004" => Ok(ScenarioId::SwappedKey),
            "corrupted_signature" | "corrupt" | "sig-005" => Ok(ScenarioId::CorruptedSignature),
            "combined_attacks" | "combined" | "sig-006" => Ok(ScenarioId::CombinedAttacks),
            // Groups
            "adversarial" => Err("Use --adversarial flag for attack scenarios".to_string()),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
