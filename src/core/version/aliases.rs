use std::collections::{BTreeMap, BTreeSet};

use crate::core::error::{AccessError, AccessResult};

/// Version parameter alias → canonical name (e.g. `drpver` → `drp_ver`).
///
/// Chains are followed to their end; cycles are rejected at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    aliases: BTreeMap<String, String>,
}

impl AliasMap {
    pub fn new(aliases: BTreeMap<String, String>) -> AccessResult<Self> {
        let aliases: BTreeMap<String, String> =
            aliases.into_iter().filter(|(a, c)| a != c).collect();

        for start in aliases.keys() {
            let mut seen = BTreeSet::from([start.as_str()]);
            let mut current = start.as_str();
            while let Some(next) = aliases.get(current) {
                if !seen.insert(next.as_str()) {
                    return Err(AccessError::Config(format!(
                        "version alias cycle through \"{start}\""
                    )));
                }
                current = next;
            }
        }

        Ok(Self { aliases })
    }

    /// Canonical name of `key`; unaliased keys map to themselves.
    pub fn canonical<'a>(&'a self, key: &'a str) -> &'a str {
        let mut current = key;
        while let Some(next) = self.aliases.get(current) {
            current = next;
        }
        current
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
