// ─── Per-tool Defaults ───
// Handles and work versions shared by every object of one tool, keyed by the
// tool's name. Objects copy their entry at construction, so later changes
// only reach objects built afterwards.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use tracing::debug;

use crate::core::handles::DatabaseHandle;
use crate::core::version::VersionBundle;

#[derive(Debug, Clone, Default)]
pub struct ToolDefaults {
    /// Shared handle; closing an object never closes its connection.
    pub database: Option<DatabaseHandle>,
    pub work_versions: VersionBundle,
}

static DEFAULTS: OnceLock<RwLock<HashMap<String, ToolDefaults>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, ToolDefaults>> {
    DEFAULTS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn update(tool: &str, f: impl FnOnce(&mut ToolDefaults)) {
    let mut map = registry().write().unwrap_or_else(|e| e.into_inner());
    f(map.entry(tool.to_string()).or_default());
}

pub fn set_default_database(tool: &str, handle: DatabaseHandle) {
    debug!("Default database for {tool}: {:?}", handle.dbname());
    update(tool, |d| d.database = Some(handle.shared()));
}

pub fn set_default_work_versions(tool: &str, versions: VersionBundle) {
    update(tool, |d| d.work_versions = versions);
}

/// Copy of the defaults registered for `tool`.
pub fn tool_defaults(tool: &str) -> ToolDefaults {
    registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(tool)
        .cloned()
        .unwrap_or_default()
}

pub fn clear_tool_defaults(tool: &str) {
    registry()
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .remove(tool);
}
