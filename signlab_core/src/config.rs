//! Scenario configuration: message, signature scheme, key size, armed attacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message preloaded into a fresh scenario.
pub const DEFAULT_MESSAGE: &str = "Hello, this is a secure message!";

/// RSA signature scheme used for signing and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureScheme {
    /// RSA-PSS: probabilistic (salted) padding. Two signatures over the
    /// same message generally differ byte-for-byte.
    Pss,
    /// RSASSA-PKCS1-v1_5: deterministic padding. Same key + same message
    /// always yields the same signature bytes.
    Pkcs1v15,
}

impl SignatureScheme {
    /// Both supported schemes.
    pub fn all() -> [SignatureScheme; 2] {
        [Self::Pss, Self::Pkcs1v15]
    }

    /// Name used in log narration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pss => "RSA-PSS",
            Self::Pkcs1v15 => "RSASSA-PKCS1-v1_5",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SignatureScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pss" | "rsa-pss" => Ok(Self::Pss),
            "pkcs1v15" | "pkcs1" | "pkcs1v1.5" | "rsassa-pkcs1-v1_5" => Ok(Self::Pkcs1v15),
            _ => Err(format!("Unknown scheme: {} (expected 'pss' or 'pkcs1v15')", s)),
        }
    }
}

/// Supported RSA modulus sizes.
///
/// Invalid sizes are unrepresentable past the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyBits {
    #[serde(rename = "2048")]
    Rsa2048,
    #[serde(rename = "3072")]
    Rsa3072,
    #[serde(rename = "4096")]
    Rsa4096,
}

impl KeyBits {
    /// All supported sizes, smallest first.
    pub fn all() -> [KeyBits; 3] {
        [Self::Rsa2048, Self::Rsa3072, Self::Rsa4096]
    }

    /// Modulus length in bits.
    pub fn bit_len(&self) -> usize {
        match self {
            Self::Rsa2048 => 2048,
            Self::Rsa3072 => 3072,
            Self::Rsa4096 => 4096,
        }
    }

    /// Modulus length in bytes (the expected raw signature length).
    pub fn byte_len(&self) -> usize {
        self.bit_len() / 8
    }
}

impl fmt::Display for KeyBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bit_len())
    }
}

impl TryFrom<u32> for KeyBits {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            2048 => Ok(Self::Rsa2048),
            3072 => Ok(Self::Rsa3072),
            4096 => Ok(Self::Rsa4096),
            other => Err(format!(
                "Unsupported key size: {} (expected 2048, 3072 or 4096)",
                other
            )),
        }
    }
}

/// One of the three independent attacks the lab can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Append a visible marker to the message after it was signed
    TamperMessage,
    /// Verify with B's public key instead of A's
    SwapKey,
    /// Flip signature bytes while the envelope is in transit
    CorruptSignature,
}

impl AttackKind {
    /// Canonical order: the order explanatory warnings are emitted in
    /// after a failed verification.
    pub fn canonical() -> [AttackKind; 3] {
        [Self::TamperMessage, Self::CorruptSignature, Self::SwapKey]
    }

    /// Short snake_case name (CLI, transcripts).
    pub fn name(&self) -> &'static str {
        match self {
            Self::TamperMessage => "tamper_message",
            Self::SwapKey => "swap_key",
            Self::CorruptSignature => "corrupt_signature",
        }
    }

    /// Why verification failed, phrased for the warning narration.
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::TamperMessage => "the message was tampered during transmission",
            Self::SwapKey => "the wrong public key was used for verification",
            Self::CorruptSignature => "the signature bytes were corrupted in transit",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::TamperMessage => 0b001,
            Self::SwapKey => 0b010,
            Self::CorruptSignature => 0b100,
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of armed attacks, inspected stage-by-stage during a run.
///
/// Each pipeline stage only looks at the kinds relevant to it: corruption
/// at signing time, tampering at transmission time, key swapping at
/// verification time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AttackKind>", into = "Vec<AttackKind>")]
pub struct AttackSet {
    bits: u8,
}

impl AttackSet {
    /// No attacks armed.
    pub fn none() -> Self {
        Self::default()
    }

    /// All three attacks armed.
    pub fn all() -> Self {
        let mut set = Self::none();
        for kind in AttackKind::canonical() {
            set.insert(kind);
        }
        set
    }

    /// Builder-style insertion.
    pub fn with(mut self, kind: AttackKind) -> Self {
        self.insert(kind);
        self
    }

    /// Arms `kind`.
    pub fn insert(&mut self, kind: AttackKind) {
        self.bits |= kind.bit();
    }

    /// Disarms `kind`.
    pub fn remove(&mut self, kind: AttackKind) {
        self.bits &= !kind.bit();
    }

    /// Whether `kind` is armed.
    pub fn contains(&self, kind: AttackKind) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Armed attacks in canonical order.
    pub fn active(&self) -> Vec<AttackKind> {
        AttackKind::canonical()
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    /// Number of armed attacks.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// True when no attack is armed.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl From<Vec<AttackKind>> for AttackSet {
    fn from(kinds: Vec<AttackKind>) -> Self {
        let mut set = Self::none();
        for kind in kinds {
            set.insert(kind);
        }
        set
    }
}

impl From<AttackSet> for Vec<AttackKind> {
    fn from(set: AttackSet) -> Self {
        set.active()
    }
}

impl FromIterator<AttackKind> for AttackSet {
    fn from_iter<I: IntoIterator<Item = AttackKind>>(iter: I) -> Self {
        let mut set = Self::none();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Complete description of one simulation scenario.
///
/// The orchestrator snapshots the config at the start of a run, so caller
/// mutations mid-run have no effect on that run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Message text A signs and transmits
    pub message: String,
    /// Signature scheme for signing and verification
    pub scheme: SignatureScheme,
    /// RSA modulus size for both principals' key pairs
    pub key_bits: KeyBits,
    /// Attacks armed for this run
    pub attacks: AttackSet,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            scheme: SignatureScheme::Pss,
            key_bits: KeyBits::Rsa2048,
            attacks: AttackSet::none(),
        }
    }
}

impl ScenarioConfig {
    /// Replaces the message text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Replaces the signature scheme.
    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Replaces the key size.
    pub fn with_key_bits(mut self, key_bits: KeyBits) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Arms one more attack.
    pub fn with_attack(mut self, kind: AttackKind) -> Self {
        self.attacks.insert(kind);
        self
    }
}
