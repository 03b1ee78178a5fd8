mod spec;
mod templates;

pub use spec::PathSpec;
pub(crate) use templates::placeholders;
pub use templates::{release_dir, PathTemplates};
