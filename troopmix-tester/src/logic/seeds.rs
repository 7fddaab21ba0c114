use anyhow::{Result, bail};
use std::collections::HashSet;

use troopmix_engine::stable_hash;

/// Used when no seed is given.
pub const DEFAULT_SEED: u64 = 1337;

/// A resolved seed and the token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// Set when the seed was hashed from a word rather than given as a number.
    pub label: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, label: None }
    }

    /// Seed derived from a word, e.g. a troop identity, via the stable hash.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        Self {
            seed: stable_hash(label),
            label: Some(label.to_string()),
        }
    }
}

fn is_label(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Resolve CLI seed tokens into seeds.
///
/// Numbers are used as is (negative numbers by magnitude). Word tokens such
/// as `village_elder_07` are hashed, so a run can be keyed to a troop.
/// Duplicates are dropped, keeping the first occurrence.
///
/// # Errors
///
/// Returns an error for tokens that are neither numbers nor plain words.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        let info = if let Ok(value) = token.parse::<u64>() {
            SeedInfo::from_numeric(value)
        } else if let Ok(value) = token.parse::<i64>() {
            SeedInfo::from_numeric(value.unsigned_abs())
        } else if is_label(token) {
            SeedInfo::from_label(token)
        } else {
            bail!("Unrecognized seed token: {token}");
        };

        if seen.insert(info.seed) {
            resolved.push(info);
        }
    }

    if resolved.is_empty() {
        resolved.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn resolves_numbers_and_words() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "village_elder_07"])).unwrap();
        assert_eq!(seeds[0], SeedInfo::from_numeric(42));
        assert_eq!(seeds[1], SeedInfo::from_numeric(7));
        assert_eq!(seeds[2].seed, stable_hash("village_elder_07"));
        assert_eq!(seeds[2].label.as_deref(), Some("village_elder_07"));
    }

    #[test]
    fn drops_duplicates_in_order() {
        let seeds = resolve_seed_inputs(&tokens(&["5", "9", "5", "-9"])).unwrap();
        let values: Vec<u64> = seeds.iter().map(|s| s.seed).collect();
        assert_eq!(values, vec![5, 9]);
    }

    #[test]
    fn falls_back_to_default() {
        let seeds = resolve_seed_inputs(&[]).unwrap();
        assert_eq!(seeds, vec![SeedInfo::from_numeric(DEFAULT_SEED)]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(resolve_seed_inputs(&tokens(&["not a seed!"])).is_err());
    }
}
