// src/db/models.rs

//! Data models for the package relation database
//!
//! Each installed package owns one `Relations` entry. Both lists are kept
//! sorted ascending without duplicates; that sorted form is the canonical
//! representation, so entries compare with plain sequence equality.

use serde::{Deserialize, Deserializer, Serialize};

/// Dependency edges of one installed package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    /// Packages this one was installed against
    #[serde(default, deserialize_with = "null_as_empty")]
    pub depends_on: Vec<String>,

    /// Installed packages that currently depend on this one
    #[serde(default, deserialize_with = "null_as_empty")]
    pub required_for: Vec<String>,
}

impl Relations {
    /// Entry with no graph edges
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the package neither depends on nor is required by anything
    pub fn is_isolated(&self) -> bool {
        self.depends_on.is_empty() && self.required_for.is_empty()
    }

    /// Bring hand-edited lists back to sorted, duplicate-free form
    pub fn normalize(&mut self) {
        for list in [&mut self.depends_on, &mut self.required_for] {
            list.sort();
            list.dedup();
        }
    }
}

/// Insert `item` keeping `list` sorted; no-op if already present
pub(crate) fn insert_sorted(list: &mut Vec<String>, item: &str) {
    if let Err(pos) = list.binary_search_by(|name| name.as_str().cmp(item)) {
        list.insert(pos, item.to_string());
    }
}

/// Remove every occurrence of `item`, preserving the order of the rest
pub(crate) fn remove_name(list: &mut Vec<String>, item: &str) -> bool {
    let before = list.len();
    list.retain(|name| name != item);
    list.len() != before
}

// Files written by older tools carry `null` for empty lists
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_sorted_keeps_order() {
        let mut list = Vec::new();
        for item in ["mesa", "alsa", "zlib", "glfw", "cmake"] {
            insert_sorted(&mut list, item);
        }
        assert_eq!(list, names(&["alsa", "cmake", "glfw", "mesa", "zlib"]));
    }

    #[test]
    fn test_insert_sorted_is_idempotent() {
        let mut list = names(&["alsa", "glfw"]);
        insert_sorted(&mut list, "glfw");
        insert_sorted(&mut list, "alsa");
        insert_sorted(&mut list, "glfw");
        assert_eq!(list, names(&["alsa", "glfw"]));
    }

    #[test]
    fn test_remove_name_preserves_remainder() {
        let mut list = names(&["alsa", "cmake", "glfw"]);
        assert!(remove_name(&mut list, "cmake"));
        assert_eq!(list, names(&["alsa", "glfw"]));
        assert!(!remove_name(&mut list, "cmake"));

        let mut single = names(&["alsa"]);
        assert!(remove_name(&mut single, "alsa"));
        assert!(single.is_empty());
    }

    #[test]
    fn test_relations_accept_null_lists() {
        let rel: Relations =
            serde_json::from_str(r#"{"depends_on":null,"required_for":["raylib"]}"#).unwrap();
        assert!(rel.depends_on.is_empty());
        assert_eq!(rel.required_for, names(&["raylib"]));

        let rel: Relations = serde_json::from_str("{}").unwrap();
        assert!(rel.is_isolated());
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let mut rel = Relations {
            depends_on: names(&["zlib", "glfw", "zlib", "alsa"]),
            required_for: names(&["game", "game"]),
        };
        rel.normalize();
        assert_eq!(rel.depends_on, names(&["alsa", "glfw", "zlib"]));
        assert_eq!(rel.required_for, names(&["game"]));
    }

    #[test]
    fn test_relations_equality_is_order_sensitive() {
        let a = Relations {
            depends_on: names(&["alsa", "glfw"]),
            required_for: Vec::new(),
        };
        let b = Relations {
            depends_on: names(&["glfw", "alsa"]),
            required_for: Vec::new(),
        };
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
