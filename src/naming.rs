//! Creature naming
//!
//! Names are drawn from fixed word lists by a seeded stream, so a given seed
//! always produces the same name.

use crate::rng::SeededRng;

// Kept as simple static slices; changing their order changes every name.
static FIRST: &[&str] = &[
    "Amber", "Arc", "Ash", "Atomic", "Binary", "Black", "Blind", "Blue", "Bright", "Broken",
    "Chrome", "Cinder", "Cold", "Copper", "Crimson", "Crystal", "Distant", "Echo", "Electric",
    "Feral", "Final", "Ghost", "Glass", "Golden", "Hollow", "Velvet", "Iron", "Solar", "Neon",
    "Night", "Null", "Obsidian", "Old", "Prime", "Primal", "Quiet", "Red", "Royal", "Rust",
    "Silent", "Silver", "Signal", "Paper", "Static", "Stone", "Velour", "White", "Wild",
];

static SECOND: &[&str] = &[
    "Animal", "Archive", "Beacon", "Bloom", "Body", "Carrier", "Channel", "Cipher", "Circuit",
    "Chorus", "Crown", "Current", "Drifter", "Echo", "Engine", "Figure", "Flame", "Form", "Frame",
    "Garden", "Keeper", "Mask", "Mimic", "Mirror", "Walker", "Oracle", "Pattern", "Phantom",
    "River", "Ritual", "Sensor", "Signal", "Spiral", "Structure", "Thread", "Totem", "Vector",
    "Witness", "Visitor",
];

static TAIL: &[&str] = &[
    "ALPHA", "ARCHIVE", "ATLAS", "BAND", "BLOCK", "CITY", "CORE", "DELTA", "DISTRICT", "DOMAIN",
    "ECHO", "FIELD", "GRID", "GROUP", "HOUSE", "INDEX", "LAB", "LINE", "NODE", "PHASE", "PLAZA",
    "POINT", "RANGE", "SECTOR", "UNIT", "ZONE",
];

static CONNECTORS: &[&str] = &["OF", "IN", "FROM", "UNDER", "BEYOND"];

/// Shape of a generated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// `Amber Engine`
    Pair,
    /// `Amber Engine CORE`
    Tailed,
    /// `Amber-Rust Engine`
    Hyphenated,
    /// `Amber Engine OF CORE`
    Connected,
}

impl NameStyle {
    /// Bucket a uniform draw by cumulative thresholds; the last bucket takes the rest.
    pub fn from_draw(draw: f64, thresholds: &[f64; 3]) -> Self {
        if draw < thresholds[0] {
            NameStyle::Pair
        } else if draw < thresholds[1] {
            NameStyle::Tailed
        } else if draw < thresholds[2] {
            NameStyle::Hyphenated
        } else {
            NameStyle::Connected
        }
    }
}

pub fn procedural_name(name_seed: u32, thresholds: &[f64; 3]) -> String {
    let mut rng = SeededRng::new(name_seed);
    let style = NameStyle::from_draw(rng.next_f64(), thresholds);
    match style {
        NameStyle::Pair => {
            let a = rng.pick(FIRST);
            let b = rng.pick(SECOND);
            format!("{} {}", a, b)
        }
        NameStyle::Tailed => {
            let a = rng.pick(FIRST);
            let b = rng.pick(SECOND);
            let c = rng.pick(TAIL);
            format!("{} {} {}", a, b, c)
        }
        NameStyle::Hyphenated => {
            let a = rng.pick(FIRST);
            let b = rng.pick(FIRST);
            let c = rng.pick(SECOND);
            format!("{}-{} {}", a, b, c)
        }
        NameStyle::Connected => {
            let a = rng.pick(FIRST);
            let b = rng.pick(SECOND);
            let c = rng.pick(CONNECTORS);
            let d = rng.pick(TAIL);
            format!("{} {} {} {}", a, b, c, d)
        }
    }
}

/// Lowercase, dash-separated form of a name for file names.
pub fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "creature".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: [f64; 3] = [0.56, 0.84, 0.94];

    #[test]
    fn test_name_is_deterministic() {
        assert_eq!(procedural_name(1234, &THRESHOLDS), procedural_name(1234, &THRESHOLDS));
    }

    #[test]
    fn test_style_buckets() {
        assert_eq!(NameStyle::from_draw(0.0, &THRESHOLDS), NameStyle::Pair);
        assert_eq!(NameStyle::from_draw(0.56, &THRESHOLDS), NameStyle::Tailed);
        assert_eq!(NameStyle::from_draw(0.9, &THRESHOLDS), NameStyle::Hyphenated);
        assert_eq!(NameStyle::from_draw(0.999, &THRESHOLDS), NameStyle::Connected);
    }

    #[test]
    fn test_names_use_word_lists() {
        for seed in 0..200u32 {
            let name = procedural_name(seed.wrapping_mul(2_654_435_761), &THRESHOLDS);
            let first = name.split([' ', '-']).next().unwrap();
            assert!(FIRST.contains(&first), "unexpected first word in {}", name);
        }
    }

    #[test]
    fn test_every_style_reachable() {
        let mut styles = std::collections::HashSet::new();
        for seed in 0..2000u32 {
            let name = procedural_name(seed, &THRESHOLDS);
            let words = name.split(' ').count();
            styles.insert((words, name.contains('-')));
        }
        assert!(styles.len() >= 4);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Amber-Rust Engine OF CORE"), "amber-rust-engine-of-core");
        assert_eq!(slugify("  --  "), "creature");
    }
}
