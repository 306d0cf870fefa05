//! Provably fair crash point derivation
//!
//! Each round draws a fresh random seed. The seed is run through
//! HMAC-SHA256 to produce a digest that is published as the round's
//! commitment hash the moment the round starts, while the seed itself
//! stays secret until the crash. Revealing the seed afterwards lets any
//! player recompute both the digest and the crash point, proving the
//! outcome was fixed before the first tick.
//!
//! The derivation is pure integer arithmetic so every platform and every
//! third-party verifier computes the identical crash point.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fixed HMAC input. The seed acts as the key. Changing this constant
/// would invalidate every published (hash, seed) pair, so it is part of
/// the public verification protocol.
const HMAC_MESSAGE: &[u8] = b"some-constant-string";

/// 2^52, the value range of the 13 hex digit digest prefix.
const E: u64 = 1 << 52;

/// Crash point ceiling in hundredths (1000.00x).
const MAX_CRASH_TIMES_100: u64 = 100_000;

/// Outcome fixed for one round: the crash point and its commitment hash.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashOutcome {
    /// Multiplier at which the round crashes, in [1.00, 1000.00] with
    /// exactly two decimals of precision
    pub crash_point: f64,
    /// Hex encoded HMAC-SHA256 digest published at round start
    pub hash: String,
}

/// Generate a fresh 32-byte seed, hex encoded.
pub fn random_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive the crash point and commitment hash for a seed.
///
/// The seed string's UTF-8 bytes are the HMAC key, matching what public
/// verifiers compute. The first 13 hex digits of the digest form a
/// uniform 52-bit integer `n`, mapped to a crash point by
/// `(100 * 2^52 - n) / (2^52 - n)` in hundredths. The division runs in
/// u64 because the numerator needs 59 bits, more than an f64 mantissa
/// holds exactly.
pub fn generate(seed: &str) -> CrashOutcome {
    let mut mac =
        HmacSha256::new_from_slice(seed.as_bytes()).expect("HMAC can take key of any size");
    mac.update(HMAC_MESSAGE);
    let hash = hex::encode(mac.finalize().into_bytes());

    let n = u64::from_str_radix(&hash[..13], 16).expect("digest prefix is valid hex");

    // n < 2^52, so the divisor is never zero. Integer division floors,
    // and the ceiling turns roughly one draw in a thousand into 1000.00x.
    let crash_times_100 = ((100 * E - n) / (E - n)).min(MAX_CRASH_TIMES_100);

    CrashOutcome {
        crash_point: crash_times_100 as f64 / 100.0,
        hash,
    }
}
