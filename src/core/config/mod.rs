mod env;
mod settings;

pub use env::{
    clear_session_work_versions, session_work_versions, set_mode, set_release,
    set_session_work_versions, set_settings, settings, update_settings, AccessEnv, Registries,
};
pub use settings::{settings_path, Settings, CONFIG_ENV_VAR};
