// ─── Release Registry ───
// Release → version-bundle mapping per category (survey).

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::core::error::{AccessError, AccessResult};

/// Version parameter name → version string.
pub type VersionBundle = BTreeMap<String, String>;

/// Sentinel release for unreleased data.
pub const WORK_RELEASE: &str = "WORK";

const BUNDLED_VERSIONS: &str = include_str!("../../../resources/versions.json");

/// Canonical release spelling (`dr16` → `DR16`).
pub fn canonical_release(release: &str) -> String {
    release.trim().to_ascii_uppercase()
}

pub fn is_work_release(release: &str) -> bool {
    canonical_release(release) == WORK_RELEASE
}

/// Public data releases are the `DRnn` ones.
pub fn is_public_release(release: &str) -> bool {
    public_release_number(release).is_some()
}

fn public_release_number(release: &str) -> Option<u32> {
    canonical_release(release)
        .strip_prefix("DR")
        .and_then(|n| n.parse().ok())
}

/// Registered version bundles, keyed by category then release.
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    categories: BTreeMap<String, BTreeMap<String, VersionBundle>>,
}

impl VersionRegistry {
    pub fn new(categories: BTreeMap<String, BTreeMap<String, VersionBundle>>) -> Self {
        let categories = categories
            .into_iter()
            .map(|(cat, releases)| {
                let releases = releases
                    .into_iter()
                    .map(|(rel, bundle)| (canonical_release(&rel), bundle))
                    .collect();
                (cat, releases)
            })
            .collect();
        Self { categories }
    }

    pub fn from_json(raw: &str) -> AccessResult<Self> {
        let categories = serde_json::from_str(raw)?;
        Ok(Self::new(categories))
    }

    /// The registry shipped with the crate.
    pub fn bundled() -> AccessResult<Self> {
        Self::from_json(BUNDLED_VERSIONS)
    }

    /// Load a registry file from disk.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| AccessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&raw)?;
        info!(
            "Loaded {} version categories from {:?}",
            registry.categories.len(),
            path
        );
        Ok(registry)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Registered releases of one category, or of all categories.
    pub fn release_names(&self, category: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = match category {
            Some(c) => self
                .categories
                .get(c)
                .map(|r| r.keys().cloned().collect())
                .unwrap_or_default(),
            None => self
                .categories
                .values()
                .flat_map(|r| r.keys().cloned())
                .collect(),
        };
        names.sort();
        names.dedup();
        names
    }

    /// Highest `DRnn` release across all categories.
    pub fn latest_public_release(&self) -> Option<String> {
        self.release_names(None)
            .into_iter()
            .filter_map(|r| public_release_number(&r).map(|n| (n, r)))
            .max_by_key(|(n, _)| *n)
            .map(|(_, r)| r)
    }

    /// The bundle registered for `release`.
    ///
    /// Without a category, bundles of every category registering the release
    /// are merged; the first category in name order wins on conflicts.
    pub fn bundle(&self, category: Option<&str>, release: &str) -> AccessResult<VersionBundle> {
        let release = canonical_release(release);
        let not_found = || AccessError::ReleaseNotFound {
            release: release.clone(),
            category: category.map(str::to_string),
        };

        match category {
            Some(c) => self
                .categories
                .get(c)
                .and_then(|r| r.get(&release))
                .cloned()
                .ok_or_else(not_found),
            None => {
                let mut merged = VersionBundle::new();
                let mut found = false;
                for bundle in self.categories.values().filter_map(|r| r.get(&release)) {
                    found = true;
                    for (k, v) in bundle {
                        merged.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
                if found {
                    Ok(merged)
                } else {
                    Err(not_found())
                }
            }
        }
    }
}
