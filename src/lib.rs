pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::{AccessEnv, Settings};
pub use crate::core::error::{AccessError, AccessResult};
pub use crate::core::mma::{
    AsyncDataTool, DataOrigin, DataTool, Identifier, LoadContext, Mode, Tool, ToolSpec,
};
pub use crate::core::object::{AccessOptions, DataObject, ObjectState};

/// Install the default `tracing` subscriber, filtered by `RUST_LOG`.
///
/// Does nothing when a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,archive_access=debug")),
        )
        .try_init();
}
