pub mod defaults;
mod model;
mod options;

pub use defaults::{
    clear_tool_defaults, set_default_database, set_default_work_versions, tool_defaults,
    ToolDefaults,
};
pub use model::{DataObject, ObjectState};
pub use options::AccessOptions;
