/// Registered meter serial numbers.
///
/// A meter photo only counts toward compliance if its serial number belongs
/// to a meter registered for the programme. The set is configuration: it is
/// loaded once (see `config::ServiceConfig`) and shared read-only by every
/// verification call. Nothing in this crate mutates it after construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Serials registered in the pilot deployment. Used when the config file
/// does not list any.
pub static DEFAULT_REGISTERED_SERIALS: &[&str] = &["SN-12345", "SN-67890", "SN-99999"];

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable set of known-valid meter serial numbers.
///
/// Lookups are exact and case-sensitive; surrounding whitespace is trimmed
/// when the set is built, not when it is queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RegisteredSerials {
    serials: BTreeSet<String>,
}

impl RegisteredSerials {
    pub fn new<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            serials: serials
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.serials.contains(serial)
    }

    pub fn len(&self) -> usize {
        self.serials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.serials.iter().map(String::as_str)
    }
}

impl Default for RegisteredSerials {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTERED_SERIALS)
    }
}

impl From<Vec<String>> for RegisteredSerials {
    fn from(serials: Vec<String>) -> Self {
        Self::new(serials)
    }
}

impl From<RegisteredSerials> for Vec<String> {
    fn from(registry: RegisteredSerials) -> Self {
        registry.serials.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contains_pilot_serials() {
        let registry = RegisteredSerials::default();
        for serial in ["SN-12345", "SN-67890", "SN-99999"] {
            assert!(registry.contains(serial), "default registry missing '{}'", serial);
        }
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_default_serials_have_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for serial in DEFAULT_REGISTERED_SERIALS {
            assert!(seen.insert(*serial), "duplicate serial '{}' in defaults", serial);
        }
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = RegisteredSerials::default();
        assert!(!registry.contains("sn-12345"), "lookup is case-sensitive");
        assert!(!registry.contains("SN-1234"));
        assert!(!registry.contains(""));
    }

    #[test]
    fn test_construction_trims_and_drops_blank_entries() {
        let registry = RegisteredSerials::new([" SN-1 ", "", "  ", "SN-2", "SN-1"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("SN-1"));
        assert!(registry.contains("SN-2"));
    }

    #[test]
    fn test_deserializes_from_plain_list() {
        let registry: RegisteredSerials =
            serde_json::from_str(r#"["SN-A", "SN-B"]"#).expect("list should deserialize");
        assert!(registry.contains("SN-A"));
        assert_eq!(registry.iter().collect::<Vec<_>>(), vec!["SN-A", "SN-B"]);
    }
}
