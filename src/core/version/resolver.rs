// ─── Version Resolver ───
// (category, release) → version bundle, with alias indirection and the
// layered work versions standing in for the `WORK` release.

use std::sync::Arc;

use tracing::debug;

use super::aliases::AliasMap;
use super::registry::{canonical_release, is_work_release, VersionBundle, VersionRegistry};
use super::work::WorkVersions;
use crate::core::error::{AccessError, AccessResult};

/// Alternate spellings tried after an exact key miss (`run2d` → `run2d_vers`, ...).
const KEY_SUFFIXES: [&str; 4] = ["_vers", "_ver", "ver", "vers"];

#[derive(Debug, Clone)]
pub struct VersionResolver {
    registry: Arc<VersionRegistry>,
    aliases: AliasMap,
    work: WorkVersions,
}

impl VersionResolver {
    pub fn new(registry: Arc<VersionRegistry>, aliases: AliasMap, work: WorkVersions) -> Self {
        Self {
            registry,
            aliases,
            work,
        }
    }

    /// Same resolver with per-call work version overrides applied.
    pub fn with_work_overrides(&self, overrides: VersionBundle) -> Self {
        Self {
            work: self.work.clone().with_overrides(overrides),
            ..self.clone()
        }
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn work_versions(&self) -> &WorkVersions {
        &self.work
    }

    /// Whole version bundle for a release.
    pub fn get_bundle(&self, category: Option<&str>, release: &str) -> AccessResult<VersionBundle> {
        if is_work_release(release) {
            if self.work.is_empty() {
                return Err(AccessError::NoWorkVersions);
            }
            return Ok(self.work.merged());
        }
        self.registry.bundle(category, release)
    }

    /// A single version parameter for a release.
    pub fn get_version(
        &self,
        category: Option<&str>,
        release: &str,
        key: &str,
    ) -> AccessResult<String> {
        let canonical = self.aliases.canonical(key);
        let bundle = self.get_bundle(category, release)?;

        let found = std::iter::once(canonical.to_string())
            .chain(KEY_SUFFIXES.iter().map(|s| format!("{canonical}{s}")))
            .find_map(|k| bundle.get(&k).cloned());

        match found {
            Some(version) => {
                debug!("Resolved {key} for {release}: {version}");
                Ok(version)
            }
            None => Err(AccessError::VersionNotFound {
                key: key.to_string(),
                release: canonical_release(release),
            }),
        }
    }
}
