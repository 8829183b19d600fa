//! Display name allocation
//!
//! Every member of a room is shown under a generated name. Names only
//! need to be distinguishable inside one room; uniqueness among current
//! members is enforced by `Room::join`, which re-draws on collision.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::error::AppError;
use crate::types::DisplayName;

const ADJECTIVES: &[&str] = &[
    "Happy", "Brave", "Swift", "Clever", "Mighty", "Silent", "Golden", "Mystic", "Noble", "Wild",
];

const NOUNS: &[&str] = &[
    "Tiger", "Eagle", "Dragon", "Phoenix", "Wolf", "Bear", "Fox", "Lion", "Hawk", "Panther",
];

/// How new display names are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameScheme {
    /// Adjective + noun + 4 hex digits, e.g. `SwiftFox3a9c`
    #[default]
    Creature,
    /// `user-` + 4 hex digits, e.g. `user-ab12`
    Hex,
    /// `user-1`, `user-2`, ...
    Counter,
}

impl FromStr for NameScheme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "creature" => Ok(Self::Creature),
            "hex" => Ok(Self::Hex),
            "counter" => Ok(Self::Counter),
            other => Err(AppError::Config(format!("unknown name scheme '{}'", other))),
        }
    }
}

/// Produces display names for newly joined members
///
/// Safe to share between tasks. The random schemes can collide
/// (1 in 65536 per suffix for `Hex`); callers that need per-room
/// distinctness check against the current membership and call
/// `allocate` again.
#[derive(Debug, Default)]
pub struct NameAllocator {
    scheme: NameScheme,
    counter: AtomicU64,
}

impl NameAllocator {
    pub fn new(scheme: NameScheme) -> Self {
        Self {
            scheme,
            counter: AtomicU64::new(0),
        }
    }

    /// Produce a fresh display name
    pub fn allocate(&self) -> DisplayName {
        let name = match self.scheme {
            NameScheme::Creature => {
                let mut rng = rand::thread_rng();
                let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
                let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
                format!("{}{}{:04x}", adjective, noun, rng.gen::<u16>())
            }
            NameScheme::Hex => format!("user-{:04x}", rand::thread_rng().gen::<u16>()),
            NameScheme::Counter => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
                format!("user-{}", n)
            }
        };
        DisplayName(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creature_name_shape() {
        let names = NameAllocator::new(NameScheme::Creature);
        let name = names.allocate();

        assert!(ADJECTIVES.iter().any(|a| name.as_str().starts_with(a)));
        let suffix = &name.as_str()[name.as_str().len() - 4..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hex_name_shape() {
        let name = NameAllocator::new(NameScheme::Hex).allocate();
        assert!(name.as_str().starts_with("user-"));
        assert_eq!(name.as_str().len(), "user-".len() + 4);
    }

    #[test]
    fn test_counter_names_increment() {
        let names = NameAllocator::new(NameScheme::Counter);
        assert_eq!(names.allocate().as_str(), "user-1");
        assert_eq!(names.allocate().as_str(), "user-2");
    }

    #[test]
    fn test_counter_unique_across_threads() {
        let names = std::sync::Arc::new(NameAllocator::new(NameScheme::Counter));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let names = names.clone();
                std::thread::spawn(move || (0..50).map(|_| names.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = std::collections::HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(all.insert(name));
            }
        }
        assert_eq!(all.len(), 200);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("HEX".parse::<NameScheme>().unwrap(), NameScheme::Hex);
        assert_eq!("counter".parse::<NameScheme>().unwrap(), NameScheme::Counter);
        assert!("emoji".parse::<NameScheme>().is_err());
    }
}
