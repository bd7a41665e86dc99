//! Auxiliary randomness tools fed by a sample source.
//!
//! These are one-shot pass-through calls: they read from a [`SampleSource`],
//! condition what they read with SHA-256, and never touch session state.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use serde::Serialize;

use crate::backend::MAX_CONSECUTIVE_FAILURES;
use crate::conditioning::sha256_condition_bytes;
use crate::error::{ApplicationError, TransportError};
use crate::sources::{SampleError, SampleSource};

/// Minimum raw bytes gathered before conditioning.
pub const MIN_RAW_BYTES: usize = 32;

/// Digits in a one-time password unless asked otherwise.
pub const DEFAULT_OTP_LENGTH: usize = 6;

/// AES-GCM nonce size; encrypted messages start with it.
pub const NONCE_LEN: usize = 12;

/// Key algorithms [`generate_key`] understands, with their key size in bytes.
const KEY_ALGORITHMS: &[(&str, usize)] = &[("AES", 32)];

/// Read at least `min_raw` raw bytes from `source`.
fn gather_raw(source: &mut dyn SampleSource, min_raw: usize) -> Result<Vec<u8>, TransportError> {
    let mut raw = Vec::with_capacity(min_raw);
    let mut failures = 0u32;
    while raw.len() < min_raw {
        match source.read_sample() {
            Ok(Some(sample)) => {
                failures = 0;
                raw.extend_from_slice(&sample);
            }
            Ok(None) => {}
            Err(SampleError::Transient(message)) => {
                failures += 1;
                log::debug!("{}: {message}", source.name());
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(TransportError::new(message));
                }
            }
            Err(SampleError::Fatal(e)) => return Err(e),
        }
    }
    Ok(raw)
}

/// `n` conditioned random bytes from `source`.
pub fn random_bytes(source: &mut dyn SampleSource, n: usize) -> Result<Vec<u8>, TransportError> {
    let raw = gather_raw(source, n.max(MIN_RAW_BYTES))?;
    Ok(sha256_condition_bytes(&raw, n))
}

/// Uniform integer in `[start, end)`.
///
/// Uses rejection sampling over 64-bit words so every value in the range is
/// equally likely.
pub fn draw_integer(
    source: &mut dyn SampleSource,
    start: i64,
    end: i64,
) -> Result<i64, ApplicationError> {
    if start >= end {
        return Err(ApplicationError::EmptyRange { start, end });
    }
    let span = (i128::from(end) - i128::from(start)) as u64;
    let zone = (u64::MAX / span) * span;
    loop {
        let bytes = random_bytes(source, 32)?;
        for word in bytes.chunks_exact(8) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(word);
            let x = u64::from_le_bytes(buf);
            if x < zone {
                return Ok((i128::from(start) + i128::from(x % span)) as i64);
            }
        }
    }
}

/// Result of [`flip_coin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl std::fmt::Display for CoinSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heads => write!(f, "Heads"),
            Self::Tails => write!(f, "Tails"),
        }
    }
}

pub fn flip_coin(source: &mut dyn SampleSource) -> Result<CoinSide, ApplicationError> {
    let bytes = random_bytes(source, 1)?;
    Ok(if bytes[0] & 1 == 0 {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    })
}

/// Names accepted by [`generate_key`].
pub fn list_key_algorithms() -> Vec<&'static str> {
    KEY_ALGORITHMS.iter().map(|(name, _)| *name).collect()
}

/// Fresh symmetric key for `algorithm`, hex-encoded.
pub fn generate_key(source: &mut dyn SampleSource, algorithm: &str) -> Result<String, ApplicationError> {
    let (_, len) = KEY_ALGORITHMS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(algorithm.trim()))
        .ok_or_else(|| ApplicationError::UnsupportedAlgorithm(algorithm.to_string()))?;
    Ok(hex::encode(random_bytes(source, *len)?))
}

/// One-time password of `digits` decimal digits, each drawn uniformly.
pub fn generate_otp(source: &mut dyn SampleSource, digits: usize) -> Result<String, ApplicationError> {
    let mut otp = String::with_capacity(digits);
    for _ in 0..digits {
        let digit = draw_integer(source, 0, 10)?;
        otp.push(char::from(b'0' + digit as u8));
    }
    Ok(otp)
}

/// `len` bytes of one-time-pad material, hex-encoded.
pub fn generate_pad(source: &mut dyn SampleSource, len: usize) -> Result<String, ApplicationError> {
    Ok(hex::encode(random_bytes(source, len)?))
}

fn cipher(algorithm: &str, key_hex: &str) -> Result<Aes256Gcm, ApplicationError> {
    if !algorithm.trim().eq_ignore_ascii_case("AES") {
        return Err(ApplicationError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    let key = hex::decode(key_hex.trim()).map_err(|_| ApplicationError::InvalidKey)?;
    Aes256Gcm::new_from_slice(&key).map_err(|_| ApplicationError::InvalidKey)
}

/// Encrypt `plaintext` with AES-256-GCM under a hex key.
///
/// The nonce is drawn from `source` and prefixed to the ciphertext; the
/// result is hex-encoded.
pub fn encrypt(
    source: &mut dyn SampleSource,
    algorithm: &str,
    key_hex: &str,
    plaintext: &str,
) -> Result<String, ApplicationError> {
    let cipher = cipher(algorithm, key_hex)?;
    let nonce_bytes = random_bytes(source, NONCE_LEN)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| ApplicationError::EncryptionFailed)?;

    let mut message = nonce_bytes;
    message.extend_from_slice(&ciphertext);
    Ok(hex::encode(message))
}

/// Reverse [`encrypt`].
pub fn decrypt(algorithm: &str, key_hex: &str, message_hex: &str) -> Result<String, ApplicationError> {
    let cipher = cipher(algorithm, key_hex)?;
    let message = hex::decode(message_hex.trim()).map_err(|_| ApplicationError::InvalidCiphertext)?;
    if message.len() < NONCE_LEN {
        return Err(ApplicationError::InvalidCiphertext);
    }
    let (nonce, ciphertext) = message.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ApplicationError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| ApplicationError::DecryptionFailed)
}
