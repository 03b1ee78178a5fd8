use super::registry::VersionBundle;

/// Which layer a work version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkLayer {
    Override,
    Session,
    Config,
}

/// Work versions for the `WORK` release, layered
/// per-call override > session default > persisted configuration.
///
/// Lookups are per key: a key set in a higher layer shadows the same key
/// below it, other keys still come from the lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkVersions {
    config: VersionBundle,
    session: VersionBundle,
    overrides: VersionBundle,
}

impl WorkVersions {
    pub fn new(config: VersionBundle, session: VersionBundle) -> Self {
        Self {
            config,
            session,
            overrides: VersionBundle::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: VersionBundle) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn get(&self, key: &str) -> Option<(&str, WorkLayer)> {
        [
            (&self.overrides, WorkLayer::Override),
            (&self.session, WorkLayer::Session),
            (&self.config, WorkLayer::Config),
        ]
        .into_iter()
        .find_map(|(layer, tag)| layer.get(key).map(|v| (v.as_str(), tag)))
    }

    /// All keys across layers with the winning value for each.
    pub fn merged(&self) -> VersionBundle {
        let mut merged = self.config.clone();
        merged.extend(self.session.clone());
        merged.extend(self.overrides.clone());
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty() && self.session.is_empty() && self.overrides.is_empty()
    }
}
