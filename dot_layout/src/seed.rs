use rand::rngs::StdRng;
use rand::SeedableRng;

/// Derives a 64-bit seed from a user seed and the parts naming a unit of work.
///
/// The parts are hashed with SHA-256, so that units built from the same user seed draw from
/// unrelated random sequences, and the same unit always gets the same one.
pub fn unit_seed(seed: &str, parts: &[&str]) -> u64 {
    let mut text = seed.to_string();
    for p in parts {
        // Length-prefixed so that ("ab", "c") and ("a", "bc") differ.
        text.push_str(&format!("|{}:{}", p.len(), p));
    }
    let hex = sha256::digest(text.as_str());
    hex.chars()
        .take(16)
        .fold(0u64, |acc, c| (acc << 4) | u64::from(c.to_digit(16).unwrap_or(0)))
}

/// A random source for one unit of work, reproducible from the user seed.
pub fn unit_rng(seed: &str, parts: &[&str]) -> StdRng {
    StdRng::seed_from_u64(unit_seed(seed, parts))
}
