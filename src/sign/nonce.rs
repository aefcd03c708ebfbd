//! Nonce and timestamp generation for ticket signatures.
//!
//! Nonces only need to resist replay within a signature's short validity window, so the thread
//! RNG is sufficient.

// crates.io
use rand::seq::SliceRandom;
// self
use crate::clock::Clock;

/// Characters a nonce is drawn from.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Shortest nonce produced.
pub const MIN_LEN: usize = 16;
/// Longest nonce produced (every alphabet character once).
pub const MAX_LEN: usize = ALPHABET.len();

/// Returns a random alphanumeric nonce of `len` distinct characters, with `len` clamped to
/// [`MIN_LEN`]..=[`MAX_LEN`].
pub fn generate(len: usize) -> String {
	let len = len.clamp(MIN_LEN, MAX_LEN);
	let mut symbols = *ALPHABET;

	symbols.shuffle(&mut rand::rng());

	symbols[..len].iter().copied().map(char::from).collect()
}

/// Returns the clock's current Unix timestamp paired with a fresh nonce of `len` characters.
pub fn timestamp_and_nonce(clock: &dyn Clock, len: usize) -> (i64, String) {
	(clock.unix_timestamp(), generate(len))
}
