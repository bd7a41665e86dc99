//! Sample conditioning.
//!
//! All post-processing of raw samples lives here; sources and backends never
//! whiten data themselves. A session selects one conditioner by id
//! ([`SessionConfig::conditioner_id`](crate::config::SessionConfig)), and the
//! backend runs every sample through [`condition`] before it is rendered or
//! written.
//!
//! ```text
//! Source → raw sample → condition(mode) → line / file / entropy pool
//! ```
//!
//! - **none**: bytes pass through unchanged.
//! - **von_neumann**: removes first-order bias; output is shorter than input
//!   (~25% yield on unbiased input).
//! - **sha256**: chained SHA-256 in counter mode; destroys the raw signal,
//!   output is uniform.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Conditioning mode for collected samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditioningMode {
    /// No conditioning.
    #[default]
    Raw,
    /// Von Neumann debiasing only.
    VonNeumann,
    /// SHA-256 hash conditioning.
    Sha256,
}

impl ConditioningMode {
    pub const ALL: [ConditioningMode; 3] = [Self::Raw, Self::VonNeumann, Self::Sha256];

    /// Persisted identifier.
    pub fn id(self) -> &'static str {
        match self {
            Self::Raw => "none",
            Self::VonNeumann => "von_neumann",
            Self::Sha256 => "sha256",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Raw => "None (raw samples)",
            Self::VonNeumann => "Von Neumann debiasing",
            Self::Sha256 => "SHA-256 extractor",
        }
    }

    /// Look up a conditioner by id. Accepts a few common spellings.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "" | "none" | "raw" => Some(Self::Raw),
            "von_neumann" | "vonneumann" | "vn" => Some(Self::VonNeumann),
            "sha256" | "sha" => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConditioningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Catalog entry for a conditioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionerInfo {
    pub id: &'static str,
    pub label: &'static str,
}

/// Every available conditioner as `{id, label}` pairs.
pub fn list_conditioners() -> Vec<ConditionerInfo> {
    ConditioningMode::ALL
        .iter()
        .map(|m| ConditionerInfo {
            id: m.id(),
            label: m.label(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Central conditioning gateway
// ---------------------------------------------------------------------------

/// Apply `mode` to one raw sample, producing at most `n_output` bytes.
///
/// - `Raw`: the input, truncated to `n_output`
/// - `VonNeumann`: debiased, then truncated to `n_output`
/// - `Sha256`: exactly `n_output` bytes of chained SHA-256 output
pub fn condition(raw: &[u8], n_output: usize, mode: ConditioningMode) -> Vec<u8> {
    match mode {
        ConditioningMode::Raw => {
            let mut out = raw.to_vec();
            out.truncate(n_output);
            out
        }
        ConditioningMode::VonNeumann => {
            let mut out = von_neumann_debias(raw);
            out.truncate(n_output);
            out
        }
        ConditioningMode::Sha256 => sha256_condition_bytes(raw, n_output),
    }
}

/// SHA-256 chained conditioning: stretches or compresses raw bytes to exactly
/// `n_output` bytes.
///
/// Each 32-byte output block is SHA-256(state || chunk || counter), with the
/// state chained from the previous block's digest.
pub fn sha256_condition_bytes(raw: &[u8], n_output: usize) -> Vec<u8> {
    if raw.is_empty() {
        return vec![0u8; n_output];
    }
    let mut output = Vec::with_capacity(n_output);
    let mut state = [0u8; 32];
    let mut offset = 0;
    let mut counter: u64 = 0;
    while output.len() < n_output {
        let end = (offset + 64).min(raw.len());
        let mut h = Sha256::new();
        h.update(state);
        h.update(&raw[offset..end]);
        h.update(counter.to_le_bytes());
        state = h.finalize().into();
        output.extend_from_slice(&state);
        offset += 64;
        counter += 1;
        if offset >= raw.len() {
            offset = 0;
        }
    }
    output.truncate(n_output);
    output
}

/// Von Neumann debiasing: (0,1) → 0, (1,0) → 1, equal pairs discarded.
pub fn von_neumann_debias(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::new();
    for byte in data {
        for i in (0..8).step_by(2) {
            let b1 = (byte >> (7 - i)) & 1;
            let b2 = (byte >> (6 - i)) & 1;
            if b1 != b2 {
                bits.push(b1);
            }
        }
    }

    let mut result = Vec::with_capacity(bits.len() / 8);
    for chunk in bits.chunks_exact(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= bit << (7 - i);
        }
        result.push(byte);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_raw_passthrough() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(condition(&data, 3, ConditioningMode::Raw), vec![1, 2, 3]);
        assert_eq!(condition(&data, 10, ConditioningMode::Raw), data);
    }

    #[test]
    fn test_condition_sha256_produces_exact_length() {
        let data = vec![42u8; 100];
        assert_eq!(condition(&data, 64, ConditioningMode::Sha256).len(), 64);
        assert_eq!(condition(&data, 5, ConditioningMode::Sha256).len(), 5);
    }

    #[test]
    fn test_sha256_is_deterministic() {
        let data = b"sample line 1234";
        assert_eq!(
            sha256_condition_bytes(data, 32),
            sha256_condition_bytes(data, 32)
        );
        assert_ne!(
            sha256_condition_bytes(data, 32),
            sha256_condition_bytes(b"sample line 1235", 32)
        );
    }

    #[test]
    fn test_sha256_empty_input() {
        assert_eq!(sha256_condition_bytes(&[], 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_von_neumann_alternating_bits() {
        // Every pair is (1,0) → four 1-bits per input byte.
        let output = von_neumann_debias(&[0b1010_1010u8; 128]);
        assert_eq!(output.len(), 64);
        assert!(output.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_von_neumann_discards_equal_pairs() {
        assert!(von_neumann_debias(&[0x00, 0xFF, 0b1100_0011]).is_empty());
    }

    #[test]
    fn test_condition_modes_differ() {
        let data: Vec<u8> = (0..=255).collect();
        let raw = condition(&data, 64, ConditioningMode::Raw);
        let sha = condition(&data, 64, ConditioningMode::Sha256);
        assert_ne!(raw, sha);
    }

    #[test]
    fn test_ids_roundtrip_through_catalog() {
        let catalog = list_conditioners();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].id, "none");
        for info in catalog {
            let mode = ConditioningMode::from_id(info.id).unwrap();
            assert_eq!(mode.id(), info.id);
            assert!(!info.label.is_empty());
        }
    }

    #[test]
    fn test_from_id_aliases_and_unknown() {
        assert_eq!(ConditioningMode::from_id(""), Some(ConditioningMode::Raw));
        assert_eq!(ConditioningMode::from_id("vn"), Some(ConditioningMode::VonNeumann));
        assert_eq!(ConditioningMode::from_id("sha"), Some(ConditioningMode::Sha256));
        assert_eq!(ConditioningMode::from_id("SHA256"), None);
        assert_eq!(ConditioningMode::from_id("aes"), None);
    }
}
