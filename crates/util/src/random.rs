use rand::rngs::OsRng;
use rand::seq::SliceRandom;

/// ASCII letters and digits.
pub const ALPHABET_62: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
/// Lowercase letters and digits.
pub const ALPHABET_36: &str = "abcdefghijklmnopqrstuvwxyz1234567890";

/// `n` characters drawn uniformly from `alphabet` using the OS RNG.
///
/// An empty alphabet yields an empty string.
pub fn rand_string(alphabet: &str, n: usize) -> String {
    let letters: Vec<char> = alphabet.chars().collect();
    let mut rng = OsRng;
    (0..n)
        .filter_map(|_| letters.choose(&mut rng).copied())
        .collect()
}
