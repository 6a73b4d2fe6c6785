//! Attack transforms applied to the exchange in transit.
//!
//! These are pure functions: the orchestrator decides *when* to apply
//! them and what to narrate. Key swapping has no transform here because
//! it is a key-selection decision at verification time, not a byte
//! mutation.

use rand::Rng;
use rand::RngCore;

/// Marker appended to a tampered message.
pub const TAMPER_MARKER: &str = " [TAMPERED]";

/// Byte positions a corruption flips (fewer on shorter input).
pub const CORRUPT_FLIPS: usize = 3;

/// Appends the visible tamper marker to `message`.
///
/// The original text is preserved as a prefix so the narration can show
/// exactly what changed.
pub fn tamper_message(message: &str) -> String {
    format!("{}{}", message, TAMPER_MARKER)
}

/// Flips `min(3, len)` distinct byte positions of `signature` by XOR with
/// `0xFF`.
///
/// Returns the corrupted copy together with the flipped offsets in
/// ascending order. Offsets are sampled without replacement, so the output
/// always differs from the input in exactly `min(3, len)` positions; empty
/// input comes back unchanged. The RNG is injected so deterministic
/// environments reproduce the exact same corruption.
pub fn corrupt_signature<R: RngCore>(signature: &[u8], rng: &mut R) -> (Vec<u8>, Vec<usize>) {
    let mut corrupted = signature.to_vec();
    let flips = CORRUPT_FLIPS.min(corrupted.len());

    let mut offsets: Vec<usize> = Vec::with_capacity(flips);
    while offsets.len() < flips {
        let offset = rng.gen_range(0..corrupted.len());
        if !offsets.contains(&offset) {
            offsets.push(offset);
        }
    }
    offsets.sort_unstable();

    for &offset in &offsets {
        corrupted[offset] ^= 0xFF;
    }
    (corrupted, offsets)
}
