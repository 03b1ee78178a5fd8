mod profile;
mod registry;

pub(crate) use profile::join_url;
pub use profile::{Affix, ApiProfile, AuthInfo, Domain, ProfileInfo, Stems, LOCAL_DOMAIN};
pub use registry::ApiRegistry;
