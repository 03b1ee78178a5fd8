// ─── Multi-Modal Access ───
// Identifier → data origin (file, db or api) and the tool capabilities the
// chosen origin is loaded through.

pub mod engine;
mod identifier;
mod mode;
mod spec;
mod tool;

pub use engine::{load, load_async, resolve, LoadRequest, Resolution, Resources};
pub use identifier::Identifier;
pub use mode::{DataOrigin, Mode};
pub use spec::{MappedVersion, ToolSpec, ToolSpecBuilder};
pub use tool::{AsyncDataTool, DataTool, LoadContext, Tool};
