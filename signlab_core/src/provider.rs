//! Crypto provider: the contract the orchestrator drives for all
//! cryptographic work, plus the real RSA-backed implementation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use rsa::traits::PublicKeyParts;
use rsa::{pkcs1v15, pss, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};

use signlab_env::LabEnv;

use crate::config::{KeyBits, SignatureScheme};
use crate::error::CryptoError;

// ==== RNG stream layout ====
//
// Stream ids separate independent entropy consumers so a seeded
// environment reproduces each one independently (see LabEnv::derive_rng).

/// Key generation stream for principal A.
const KEYGEN_STREAM_A: u64 = 0x0A;
/// Key generation stream for principal B.
const KEYGEN_STREAM_B: u64 = 0x0B;
/// Base for per-call signing salt streams.
const SIGN_STREAM_BASE: u64 = 0x1000;

/// Key-holding participant in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// The signer
    A,
    /// The verifier
    B,
}

impl Principal {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// SHA-256 digest of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDigest([u8; 32]);

impl MessageDigest {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex of the full digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// One principal's RSA key pair.
///
/// Produced all-or-nothing by [`CryptoProvider::generate_keypair`]: the
/// orchestrator never holds a public key without its private half.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Public half (shared with the verifier)
    pub public: RsaPublicKey,
    /// Private half (never leaves the signer)
    pub private: RsaPrivateKey,
}

/// Contract the orchestrator consumes for all cryptographic operations.
///
/// The engine never does crypto itself; it drives an injected provider,
/// which lets tests substitute failing or instrumented implementations
/// and keeps every nondeterministic choice behind the environment seam.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Generates a fresh RSA key pair for `owner`.
    ///
    /// `owner` selects the environment RNG stream, so deterministic
    /// environments derive stable per-principal key material from the
    /// master seed. `scheme` does not affect the generated material; RSA
    /// key pairs work with either padding mode.
    fn generate_keypair(
        &self,
        scheme: SignatureScheme,
        bits: KeyBits,
        owner: Principal,
    ) -> Result<KeyPair, CryptoError>;

    /// SHA-256 digest of `message`. Infallible.
    fn digest(&self, message: &str) -> MessageDigest;

    /// Signs `message` (hash-then-sign) with `key` under `scheme`.
    fn sign(
        &self,
        key: &RsaPrivateKey,
        message: &str,
        scheme: SignatureScheme,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Verifies `signature` over `message` with `key` under `scheme`.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not
    /// verify. `Err(CryptoError::VerificationInput)` is reserved for
    /// structurally malformed input: an empty signature, or one whose
    /// length is not the key's modulus length.
    fn verify(
        &self,
        key: &RsaPublicKey,
        message: &str,
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool, CryptoError>;
}

/// Real provider backed by the `rsa` crate.
///
/// PSS signing uses the crate's blinded signing key with a fresh
/// environment-derived salt per call (salt length = digest length, 32
/// bytes); PKCS1v1.5 signing is fully deterministic and needs no RNG.
pub struct RsaProvider<E: LabEnv> {
    env: Arc<E>,
    /// Distinct stream per signing call so PSS salts never repeat
    sign_calls: AtomicU64,
}

impl<E: LabEnv> RsaProvider<E> {
    /// Creates a provider drawing entropy from `env`.
    pub fn new(env: Arc<E>) -> Self {
        Self {
            env,
            sign_calls: AtomicU64::new(0),
        }
    }

    fn keygen_rng(&self, owner: Principal) -> Result<ChaCha8Rng, CryptoError> {
        let stream = match owner {
            Principal::A => KEYGEN_STREAM_A,
            Principal::B => KEYGEN_STREAM_B,
        };
        self.env
            .derive_rng(stream)
            .map_err(|e| CryptoError::key_generation(e.to_string()))
    }

    fn sign_rng(&self) -> Result<ChaCha8Rng, CryptoError> {
        let stream = SIGN_STREAM_BASE + self.sign_calls.fetch_add(1, Ordering::Relaxed);
        self.env
            .derive_rng(stream)
            .map_err(|e| CryptoError::signing(e.to_string()))
    }
}

impl<E: LabEnv> CryptoProvider for RsaProvider<E> {
    fn generate_keypair(
        &self,
        _scheme: SignatureScheme,
        bits: KeyBits,
        owner: Principal,
    ) -> Result<KeyPair, CryptoError> {
        let mut rng = self.keygen_rng(owner)?;
        let private = RsaPrivateKey::new(&mut rng, bits.bit_len())
            .map_err(|e| CryptoError::key_generation(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair { public, private })
    }

    fn digest(&self, message: &str) -> MessageDigest {
        MessageDigest(Sha256::digest(message.as_bytes()).into())
    }

    fn sign(
        &self,
        key: &RsaPrivateKey,
        message: &str,
        scheme: SignatureScheme,
    ) -> Result<Vec<u8>, CryptoError> {
        match scheme {
            SignatureScheme::Pss => {
                let mut rng = self.sign_rng()?;
                let signing_key = pss::BlindedSigningKey::<Sha256>::new(key.clone());
                let sig = signing_key
                    .try_sign_with_rng(&mut rng, message.as_bytes())
                    .map_err(|e| CryptoError::signing(e.to_string()))?;
                Ok(sig.to_vec())
            }
            SignatureScheme::Pkcs1v15 => {
                let signing_key = pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let sig = signing_key
                    .try_sign(message.as_bytes())
                    .map_err(|e| CryptoError::signing(e.to_string()))?;
                Ok(sig.to_vec())
            }
        }
    }

    fn verify(
        &self,
        key: &RsaPublicKey,
        message: &str,
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool, CryptoError> {
        if signature.is_empty() {
            return Err(CryptoError::verification_input("empty signature"));
        }
        if signature.len() != key.size() {
            return Err(CryptoError::verification_input(format!(
                "signature is {} bytes, expected {} for this key",
                signature.len(),
                key.size()
            )));
        }

        match scheme {
            SignatureScheme::Pss => {
                let verifying_key = pss::VerifyingKey::<Sha256>::new(key.clone());
                let sig = match pss::Signature::try_from(signature) {
                    Ok(sig) => sig,
                    Err(e) => return Err(CryptoError::verification_input(e.to_string())),
                };
                Ok(verifying_key.verify(message.as_bytes(), &sig).is_ok())
            }
            SignatureScheme::Pkcs1v15 => {
                let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                let sig = match pkcs1v15::Signature::try_from(signature) {
                    Ok(sig) => sig,
                    Err(e) => return Err(CryptoError::verification_input(e.to_string())),
                };
                Ok(verifying_key.verify(message.as_bytes(), &sig).is_ok())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signlab_env::TokioEnv;
    use std::sync::OnceLock;

    // 2048-bit generation is slow in debug builds; share one pair per
    // principal across the whole module.
    static KEYS_A: OnceLock<KeyPair> = OnceLock::new();
    static KEYS_B: OnceLock<KeyPair> = OnceLock::new();

    fn provider() -> RsaProvider<TokioEnv> {
        RsaProvider::new(TokioEnv::shared())
    }

    fn keys_a() -> &'static KeyPair {
        KEYS_A.get_or_init(|| {
            provider()
                .generate_keypair(SignatureScheme::Pss, KeyBits::Rsa2048, Principal::A)
                .unwrap()
        })
    }

    fn keys_b() -> &'static KeyPair {
        KEYS_B.get_or_init(|| {
            provider()
                .generate_keypair(SignatureScheme::Pss, KeyBits::Rsa2048, Principal::B)
                .unwrap()
        })
    }

    #[test]
    fn test_digest_known_vectors() {
        let p = provider();
        assert_eq!(
            p.digest("abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            p.digest("").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_keypair_matches_bits() {
        assert_eq!(keys_a().public.size(), KeyBits::Rsa2048.byte_len());
    }

    #[test]
    fn test_sign_verify_round_trip_pss() {
        let p = provider();
        let keys = keys_a();
        let sig = p
            .sign(&keys.private, "attack at dawn", SignatureScheme::Pss)
            .unwrap();

        assert_eq!(sig.len(), KeyBits::Rsa2048.byte_len());
        assert!(p
            .verify(&keys.public, "attack at dawn", &sig, SignatureScheme::Pss)
            .unwrap());
        assert!(!p
            .verify(&keys.public, "attack at dusk", &sig, SignatureScheme::Pss)
            .unwrap());
    }

    #[test]
    fn test_sign_verify_round_trip_pkcs1v15() {
        let p = provider();
        let keys = keys_a();
        let sig = p
            .sign(&keys.private, "attack at dawn", SignatureScheme::Pkcs1v15)
            .unwrap();

        assert!(p
            .verify(
                &keys.public,
                "attack at dawn",
                &sig,
                SignatureScheme::Pkcs1v15
            )
            .unwrap());
        assert!(!p
            .verify(
                &keys.public,
                "attack at dusk",
                &sig,
                SignatureScheme::Pkcs1v15
            )
            .unwrap());
    }

    #[test]
    fn test_pkcs1v15_is_deterministic() {
        let p = provider();
        let keys = keys_a();
        let s1 = p
            .sign(&keys.private, "same message", SignatureScheme::Pkcs1v15)
            .unwrap();
        let s2 = p
            .sign(&keys.private, "same message", SignatureScheme::Pkcs1v15)
            .unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_pss_signatures_differ_but_both_verify() {
        let p = provider();
        let keys = keys_a();
        let s1 = p
            .sign(&keys.private, "same message", SignatureScheme::Pss)
            .unwrap();
        let s2 = p
            .sign(&keys.private, "same message", SignatureScheme::Pss)
            .unwrap();

        assert_ne!(s1, s2);
        assert!(p
            .verify(&keys.public, "same message", &s1, SignatureScheme::Pss)
            .unwrap());
        assert!(p
            .verify(&keys.public, "same message", &s2, SignatureScheme::Pss)
            .unwrap());
    }

    #[test]
    fn test_wrong_key_rejects() {
        let p = provider();
        let sig = p
            .sign(&keys_a().private, "hello", SignatureScheme::Pss)
            .unwrap();

        assert!(!p
            .verify(&keys_b().public, "hello", &sig, SignatureScheme::Pss)
            .unwrap());
    }

    #[test]
    fn test_verify_empty_signature_is_input_error() {
        let p = provider();
        let err = p
            .verify(&keys_a().public, "hello", &[], SignatureScheme::Pss)
            .unwrap_err();
        assert!(matches!(err, CryptoError::VerificationInput(_)));
    }

    #[test]
    fn test_verify_wrong_length_is_input_error() {
        let p = provider();
        let err = p
            .verify(
                &keys_a().public,
                "hello",
                &[0u8; 16],
                SignatureScheme::Pkcs1v15
            )
            .unwrap_err();
        assert!(matches!(err, CryptoError::VerificationInput(_)));
    }

    #[test]
    fn test_corrupted_but_well_formed_signature_is_false_not_error() {
        let p = provider();
        let keys = keys_a();
        let mut sig = p
            .sign(&keys.private, "hello", SignatureScheme::Pss)
            .unwrap();
        sig[0] ^= 0xFF;
        sig[100] ^= 0xFF;

        assert!(!p
            .verify(&keys.public, "hello", &sig, SignatureScheme::Pss)
            .unwrap());
    }
}
