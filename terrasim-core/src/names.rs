//! Deterministic polity name generation and slow language drift.

use crate::rng::SplitMix64;

const PREFIXES: &[&str] = &["", "New ", "Old ", "Great ", "North ", "South "];
const SYLLABLES: &[&str] = &[
    "na", "mar", "sol", "lin", "ter", "gar", "bel", "kin", "ran", "dus", "zen", "rom", "lor",
    "via", "qui",
];
const SUFFIXES: &[&str] = &["", "ia", "land", "stan", "grad"];

/// Two to three syllables between an optional prefix and suffix, first
/// letter capitalized. All draws come from the caller's stream.
pub fn generate_name(rng: &mut SplitMix64) -> String {
    let prefix = PREFIXES[(rng.next_u64() % PREFIXES.len() as u64) as usize];
    let count = 2 + (rng.next_u64() % 2) as usize;
    let mut body = String::new();
    for _ in 0..count {
        body.push_str(SYLLABLES[(rng.next_u64() % SYLLABLES.len() as u64) as usize]);
    }
    let suffix = SUFFIXES[(rng.next_u64() % SUFFIXES.len() as u64) as usize];
    let mut name = format!("{prefix}{body}{suffix}");
    if let Some(first) = name.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    name
}

/// Language drift: keep the stem, swap the suffix, sometimes drop the
/// epithet prefix. Renames stay recognizably related to the old name.
pub fn evolve_name(old: &str, rng: &mut SplitMix64) -> String {
    let stripped = PREFIXES
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| old.strip_prefix(p))
        .unwrap_or(old);
    let stem = SUFFIXES
        .iter()
        .rev()
        .filter(|s| !s.is_empty())
        .find_map(|s| stripped.strip_suffix(s))
        .unwrap_or(stripped);
    let stem = if stem.is_empty() { stripped } else { stem };
    loop {
        let suffix = SUFFIXES[(rng.next_u64() % SUFFIXES.len() as u64) as usize];
        let candidate = format!("{stem}{suffix}");
        if candidate != old {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_deterministic_per_stream() {
        let mut a = SplitMix64::new(42);
        let mut b = SplitMix64::new(42);
        assert_eq!(generate_name(&mut a), generate_name(&mut b));
        let name = generate_name(&mut a);
        assert!(!name.is_empty());
        assert!(name.chars().next().unwrap().is_ascii_uppercase());
    }

    #[test]
    fn evolution_changes_the_name_but_keeps_the_stem() {
        let mut rng = SplitMix64::new(7);
        let old = "Marsolia".to_string();
        let new = evolve_name(&old, &mut rng);
        assert_ne!(new, old);
        assert!(new.starts_with("Marsol"));
    }
}
