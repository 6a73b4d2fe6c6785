//! JSON transcript exporter for scenario runs.
//!
//! Serializes the narrated event log plus the run configuration so a run
//! can be archived, inspected, or diffed against another seed outside the
//! CLI.

use crate::runner::ScenarioResult;
use serde::{Deserialize, Serialize};
use signlab_core::{LogEntry, ScenarioConfig};
use std::fs::File;
use std::io::Write;
use std::time::UNIX_EPOCH;

/// One narration line in a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Log id, strictly increasing in append order
    pub id: u64,

    /// Wall-clock seconds since the Unix epoch (virtual in simulation)
    pub time_secs: f64,

    /// Attributed actor
    pub actor: String,

    /// Severity
    pub level: String,

    /// Narration text
    pub text: String,
}

impl TranscriptEntry {
    fn from_log(entry: &LogEntry) -> Self {
        let time_secs = entry
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        Self {
            id: entry.id,
            time_secs,
            actor: entry.actor.name().to_string(),
            level: entry.level.name().to_string(),
            text: entry.text.clone(),
        }
    }
}

/// Complete transcript of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTranscript {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Message the scenario signed
    pub message: String,

    /// Signature scheme
    pub scheme: String,

    /// RSA modulus size in bits
    pub key_bits: usize,

    /// Armed attacks
    pub attacks: Vec<String>,

    /// SHA-256 digest of the signed message, hex-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_hex: Option<String>,

    /// Signature as produced by the signer, base64-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_base64: Option<String>,

    /// Verdict of the verification step, if the run completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,

    /// Whether the run passed all scenario assertions
    pub passed: bool,

    /// All narration lines
    pub entries: Vec<TranscriptEntry>,
}

impl RunTranscript {
    /// Builds a transcript from a finished run.
    pub fn new(result: &ScenarioResult, config: &ScenarioConfig) -> Self {
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            message: config.message.clone(),
            scheme: config.scheme.name().to_string(),
            key_bits: config.key_bits.bit_len(),
            attacks: config
                .attacks
                .active()
                .into_iter()
                .map(|kind| kind.name().to_string())
                .collect(),
            digest_hex: result.digest_hex.clone(),
            signature_base64: result.signature_base64.clone(),
            verified: result.verified,
            passed: result.passed,
            entries: result.log.iter().map(TranscriptEntry::from_log).collect(),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
