// ─── Process-wide Access Environment ───
// Settings, session work versions and registries shared by every lookup.
// Objects take an `AccessEnv` snapshot at construction; later mutation of
// the globals is visible only to objects constructed afterwards.

use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::settings::Settings;
use crate::core::api::ApiRegistry;
use crate::core::error::{AccessError, AccessResult};
use crate::core::mma::Mode;
use crate::core::paths::PathTemplates;
use crate::core::version::{AliasMap, VersionBundle, VersionRegistry, VersionResolver, WorkVersions};

/// Registries loaded from the files named in the settings, or the bundled ones.
#[derive(Debug)]
pub struct Registries {
    pub apis: ApiRegistry,
    pub versions: Arc<VersionRegistry>,
    pub templates: PathTemplates,
    pub aliases: AliasMap,
}

impl Registries {
    pub fn from_settings(settings: &Settings) -> AccessResult<Self> {
        let apis = match &settings.api_profiles_path {
            Some(path) => ApiRegistry::load(path)?,
            None => ApiRegistry::bundled()?,
        };
        let versions = match &settings.versions_path {
            Some(path) => VersionRegistry::load(path)?,
            None => VersionRegistry::bundled()?,
        };
        let base_dir = settings.sas_base_dir.clone();
        let templates = match &settings.path_templates_path {
            Some(path) => PathTemplates::load(path, base_dir, &settings.sas_url)?,
            None => PathTemplates::bundled(base_dir, &settings.sas_url)?,
        };
        let aliases = AliasMap::new(settings.version_aliases.clone())?;
        Ok(Self {
            apis,
            versions: Arc::new(versions),
            templates,
            aliases,
        })
    }
}

#[derive(Debug, Default)]
struct Globals {
    settings: Arc<Settings>,
    session_work: VersionBundle,
    registries: Option<Arc<Registries>>,
}

static GLOBALS: OnceLock<RwLock<Globals>> = OnceLock::new();

fn globals() -> &'static RwLock<Globals> {
    GLOBALS.get_or_init(|| {
        RwLock::new(Globals {
            settings: Arc::new(Settings::load()),
            ..Globals::default()
        })
    })
}

fn read() -> RwLockReadGuard<'static, Globals> {
    globals().read().unwrap_or_else(|e| e.into_inner())
}

fn write() -> RwLockWriteGuard<'static, Globals> {
    globals().write().unwrap_or_else(|e| e.into_inner())
}

/// Current global settings.
pub fn settings() -> Arc<Settings> {
    read().settings.clone()
}

/// Replace the global settings. Registries are reloaded on next use.
pub fn set_settings(settings: Settings) {
    let mut g = write();
    g.settings = Arc::new(settings);
    g.registries = None;
}

pub fn update_settings(f: impl FnOnce(&mut Settings)) {
    let mut g = write();
    let mut next = (*g.settings).clone();
    f(&mut next);
    g.settings = Arc::new(next);
    g.registries = None;
}

pub fn set_release(release: &str) {
    update_settings(|s| s.release = release.to_string());
}

pub fn set_mode(mode: Mode) {
    update_settings(|s| s.mode = mode);
}

/// Session-level work versions; they shadow the persisted ones per key.
pub fn set_session_work_versions(versions: VersionBundle) {
    debug!("Session work versions set: {:?}", versions);
    write().session_work = versions;
}

pub fn session_work_versions() -> VersionBundle {
    read().session_work.clone()
}

pub fn clear_session_work_versions() {
    write().session_work.clear();
}

/// Read-only snapshot of everything a lookup consumes.
#[derive(Debug, Clone)]
pub struct AccessEnv {
    settings: Arc<Settings>,
    session_work: VersionBundle,
    registries: Arc<Registries>,
}

impl AccessEnv {
    /// Snapshot of the process-wide environment.
    pub fn global() -> AccessResult<Self> {
        {
            let g = read();
            if let Some(registries) = &g.registries {
                return Ok(Self {
                    settings: g.settings.clone(),
                    session_work: g.session_work.clone(),
                    registries: registries.clone(),
                });
            }
        }

        let mut g = write();
        let registries = match &g.registries {
            Some(r) => r.clone(),
            None => {
                let r = Arc::new(Registries::from_settings(&g.settings)?);
                g.registries = Some(r.clone());
                r
            }
        };
        Ok(Self {
            settings: g.settings.clone(),
            session_work: g.session_work.clone(),
            registries,
        })
    }

    /// An environment detached from the globals.
    pub fn new(settings: Settings) -> AccessResult<Self> {
        let registries = Registries::from_settings(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            session_work: VersionBundle::new(),
            registries: Arc::new(registries),
        })
    }

    pub fn with_session_work_versions(mut self, versions: VersionBundle) -> Self {
        self.session_work = versions;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session_work_versions(&self) -> &VersionBundle {
        &self.session_work
    }

    pub fn apis(&self) -> &ApiRegistry {
        &self.registries.apis
    }

    pub fn templates(&self) -> &PathTemplates {
        &self.registries.templates
    }

    pub fn versions(&self) -> &VersionRegistry {
        &self.registries.versions
    }

    /// Version resolver with work layers config < session (with the tool's
    /// own defaults over it) < per-call overrides.
    pub fn version_resolver(
        &self,
        tool_work: &VersionBundle,
        overrides: &VersionBundle,
    ) -> VersionResolver {
        let mut session = self.session_work.clone();
        session.extend(tool_work.clone());
        let work = WorkVersions::new(self.settings.work_versions.clone(), session)
            .with_overrides(overrides.clone());
        VersionResolver::new(
            self.registries.versions.clone(),
            self.registries.aliases.clone(),
            work,
        )
    }

    /// Name of the default API profile, if one is configured.
    pub fn default_api(&self) -> AccessResult<&str> {
        self.settings
            .default_api
            .as_deref()
            .ok_or_else(|| AccessError::Config("no default API profile configured".into()))
    }
}
