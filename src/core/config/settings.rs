use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::{AccessError, AccessResult};
use crate::core::mma::Mode;
use crate::core::version::VersionBundle;

pub const CONFIG_ENV_VAR: &str = "ARCHIVE_ACCESS_CONFIG";
const APP_DIR_NAME: &str = "archive-access";
const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_SAS_URL: &str = "https://data.sdss.org/sas";

/// User configuration consumed by the access core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub mode: Mode,
    pub release: String,
    pub ignore_db: bool,
    /// Fetch missing local files from the archive before loading them.
    pub download: bool,
    /// Persisted defaults for the `WORK` release.
    pub work_versions: VersionBundle,
    pub version_aliases: BTreeMap<String, String>,
    pub default_api: Option<String>,
    pub netrc_path: PathBuf,
    /// Root of the local archive mirror.
    pub sas_base_dir: PathBuf,
    pub sas_url: String,
    pub api_profiles_path: Option<PathBuf>,
    pub versions_path: Option<PathBuf>,
    pub path_templates_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            release: "DR17".into(),
            ignore_db: false,
            download: false,
            work_versions: VersionBundle::new(),
            version_aliases: BTreeMap::new(),
            default_api: Some("marvin".into()),
            netrc_path: PathBuf::from("~/.netrc"),
            sas_base_dir: default_sas_base_dir(),
            sas_url: DEFAULT_SAS_URL.into(),
            api_profiles_path: None,
            versions_path: None,
            path_templates_path: None,
        }
    }
}

fn default_sas_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("SAS_BASE_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sas")
}

/// Where the settings file is looked up: `$ARCHIVE_ACCESS_CONFIG`, else the
/// platform config directory.
pub fn settings_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(SETTINGS_FILE))
}

impl Settings {
    /// Load from the default location. Problems are logged and yield defaults.
    pub fn load() -> Self {
        let Some(path) = settings_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings at {:?}: {e}", path);
                Self::default()
            }
        }
    }

    /// Load from an explicit file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> AccessResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| AccessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&raw)
            .map_err(|e| AccessError::Config(format!("malformed settings file {path:?}: {e}")))?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> AccessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AccessError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| AccessError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
