// src/miner/verify.rs
//! Hash verification primitives
//!
//! Pure functions shared by task construction and the worker loop:
//! - SHA-256 digest of a candidate input
//! - SHA-256 midstate of the leading 64-byte block of an input template
//! - Big-endian threshold comparison against a task's complexity

use sha2::digest::generic_array::{GenericArray, typenum::U64};
use sha2::{Digest, Sha256};

/// Number of leading digest bytes the accelerator requires to be zero
/// before it reports a candidate at all.
pub const ZERO_PREFIX_LEN: usize = 4;

/// SHA-256 initialization vector (FIPS 180-4).
const SHA256_INIT: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Computes the SHA-256 digest of a candidate input
///
/// # Arguments
/// * `input` - The full candidate input bytes
///
/// # Returns
/// 32-byte digest
pub fn digest(input: &[u8]) -> [u8; 32] {
    Sha256::digest(input).into()
}

/// Computes the SHA-256 compression state after the first 64-byte block
///
/// The accelerator resumes hashing from this state for every nonce it
/// tries, so the leading block of the input template is hashed exactly
/// once per task instead of once per attempt.
///
/// # Arguments
/// * `block` - The first 64 bytes of the input template
///
/// # Returns
/// The 8-word intermediate compression state
pub fn midstate(block: &[u8; 64]) -> [u32; 8] {
    let mut state = SHA256_INIT;
    let block = GenericArray::<u8, U64>::from_slice(block);
    sha2::compress256(&mut state, std::slice::from_ref(block));
    state
}

/// Checks whether a digest qualifies against a complexity threshold
///
/// The comparison is a big-endian unsigned byte-wise less-than; a
/// digest exactly equal to the threshold does not qualify.
///
/// # Arguments
/// * `digest` - The candidate digest
/// * `complexity` - The task's complexity threshold
///
/// # Returns
/// `true` if the digest is strictly below the threshold
pub fn meets_complexity(digest: &[u8; 32], complexity: &[u8; 32]) -> bool {
    digest[..] < complexity[..]
}

/// Checks whether a digest carries the zero prefix the accelerator's
/// own filter guarantees
///
/// A reported candidate whose recomputed digest fails this check points
/// at a hardware or driver fault, not at a protocol problem.
///
/// # Arguments
/// * `digest` - The recomputed candidate digest
///
/// # Returns
/// `true` if the leading bytes are all zero
pub fn has_zero_prefix(digest: &[u8; 32]) -> bool {
    digest[..ZERO_PREFIX_LEN].iter().all(|&b| b == 0)
}
