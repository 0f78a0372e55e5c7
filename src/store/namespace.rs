//! Namespace registry
//!
//! Maps each logical namespace to its slice of the physical key space. Every
//! physical key is `<prefix>:<tag>:<logical-key>`; parsing goes through
//! [`KeySpace::parse`] so that no component matches raw prefixes itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::StorageBackend;
use crate::error::Result;

// == Namespace ==
/// A disjoint logical key space inside the persistent backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// General collaborator data (tokens, preferences, blobs)
    Data,
    /// Entries owned by the cache layer
    Cache,
    /// The offline mutation queue
    Queue,
}

impl Namespace {
    /// Every registered namespace.
    pub const ALL: [Namespace; 3] = [Namespace::Data, Namespace::Cache, Namespace::Queue];

    /// Segment used in physical keys.
    pub fn tag(self) -> &'static str {
        match self {
            Namespace::Data => "data",
            Namespace::Cache => "cache",
            Namespace::Queue => "queue",
        }
    }

    /// Looks a namespace up by its tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.tag() == tag)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// == Key Space ==
/// The physical key layout under one application prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Physical key for `logical` in `namespace`.
    pub fn physical(&self, namespace: Namespace, logical: &str) -> String {
        format!("{}:{}:{}", self.prefix, namespace.tag(), logical)
    }

    /// Splits a physical key into its namespace and logical key.
    ///
    /// Returns `None` for keys outside this key space, including keys whose
    /// namespace segment is not registered.
    pub fn parse<'a>(&self, physical: &'a str) -> Option<(Namespace, &'a str)> {
        let rest = physical.strip_prefix(self.prefix.as_str())?.strip_prefix(':')?;
        let (tag, logical) = rest.split_once(':')?;
        Some((Namespace::from_tag(tag)?, logical))
    }

    /// True if the key belongs to any registered namespace.
    pub fn owns(&self, physical: &str) -> bool {
        self.parse(physical).is_some()
    }

    /// Logical keys stored in `namespace`, sorted.
    pub fn keys_in(&self, backend: &dyn StorageBackend, namespace: Namespace) -> Result<Vec<String>> {
        let mut keys: Vec<String> = backend
            .keys()?
            .iter()
            .filter_map(|physical| match self.parse(physical) {
                Some((ns, logical)) if ns == namespace => Some(logical.to_string()),
                _ => None,
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Physical keys of every registered namespace.
    pub fn owned_keys(&self, backend: &dyn StorageBackend) -> Result<Vec<String>> {
        Ok(backend
            .keys()?
            .into_iter()
            .filter(|physical| self.owns(physical))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn test_physical_and_parse() {
        let space = KeySpace::new("app");
        let physical = space.physical(Namespace::Cache, "recipes:42");
        assert_eq!(physical, "app:cache:recipes:42");
        assert_eq!(space.parse(&physical), Some((Namespace::Cache, "recipes:42")));
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        let space = KeySpace::new("app");
        assert_eq!(space.parse("other:data:x"), None);
        // Prefix must be followed by the separator
        assert_eq!(space.parse("application:data:x"), None);
        assert_eq!(space.parse("app:unknown:x"), None);
        assert_eq!(space.parse("app:data"), None);
    }

    #[test]
    fn test_keys_in_namespace() {
        let backend = MemoryBackend::new();
        let space = KeySpace::new("app");
        backend.set_item(&space.physical(Namespace::Data, "b"), "1").unwrap();
        backend.set_item(&space.physical(Namespace::Data, "a"), "1").unwrap();
        backend.set_item(&space.physical(Namespace::Cache, "c"), "1").unwrap();
        backend.set_item("unrelated", "1").unwrap();

        assert_eq!(space.keys_in(&backend, Namespace::Data).unwrap(), vec!["a", "b"]);
        assert_eq!(space.keys_in(&backend, Namespace::Cache).unwrap(), vec!["c"]);
        assert_eq!(space.owned_keys(&backend).unwrap().len(), 3);
    }

    #[test]
    fn test_tags_round_trip() {
        for ns in Namespace::ALL {
            assert_eq!(Namespace::from_tag(ns.tag()), Some(ns));
        }
    }
}
