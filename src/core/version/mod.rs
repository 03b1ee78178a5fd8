pub mod aliases;
pub mod registry;
pub mod resolver;
pub mod work;

pub use aliases::AliasMap;
pub use registry::{
    canonical_release, is_public_release, is_work_release, VersionBundle, VersionRegistry,
    WORK_RELEASE,
};
pub use resolver::VersionResolver;
pub use work::{WorkLayer, WorkVersions};
