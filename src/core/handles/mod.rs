pub mod database;
pub mod remote;

pub use database::{DatabaseConnection, DatabaseHandle, DbInput, ModelDef, OrmKind, SchemaDef};
pub use remote::{ApiData, ClientKind, RemoteHandle, RemoteInput};

use crate::core::config::AccessEnv;
use crate::core::error::AccessResult;

/// Common surface of the backend handles a data object holds.
pub trait ResourceHandle {
    fn is_connected(&self) -> bool;
    /// Release held resources. Safe to call more than once.
    fn close(&mut self);
}

/// The handles attached to one data object.
///
/// The remote handle is only built the first time an api load needs it,
/// from the configured input or else the default API profile.
#[derive(Debug, Default)]
pub struct Backends {
    pub database: Option<DatabaseHandle>,
    pub remote: Option<RemoteHandle>,
    pub remote_input: Option<RemoteInput>,
    pub client: ClientKind,
}

impl Backends {
    /// A database handle usable for loading.
    pub fn has_db(&self) -> bool {
        self.database.as_ref().is_some_and(|db| db.is_connected())
    }

    pub fn remote_or_init(&mut self, env: &AccessEnv) -> AccessResult<&mut RemoteHandle> {
        let handle = match self.remote.take() {
            Some(handle) => handle,
            None => {
                let input = match self.remote_input.clone() {
                    Some(input) => input,
                    None => RemoteInput::Profile(env.default_api()?.to_string()),
                };
                RemoteHandle::new(input, env.apis(), self.client)?
                    .with_netrc_path(env.settings().netrc_path.clone())
            }
        };
        Ok(self.remote.insert(handle))
    }

    pub fn is_connected(&self) -> bool {
        self.has_db() || self.remote.as_ref().is_some_and(|r| r.is_connected())
    }

    pub fn close(&mut self) {
        if let Some(db) = self.database.as_mut() {
            db.close();
        }
        if let Some(remote) = self.remote.as_mut() {
            remote.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::database::fakes::MemoryDb;
    use super::*;
    use crate::core::config::Settings;
    use crate::core::error::AccessError;

    #[test]
    fn remote_is_built_from_the_default_api_on_demand() {
        let env = AccessEnv::new(Settings::default()).unwrap();
        let mut backends = Backends::default();
        assert!(backends.remote.is_none());

        let remote = backends.remote_or_init(&env).unwrap();
        assert_eq!(remote.api().map(|a| a.name()), Some("marvin"));
        assert!(backends.remote.is_some());
    }

    #[test]
    fn missing_default_api_is_a_config_error() {
        let env = AccessEnv::new(Settings {
            default_api: None,
            ..Settings::default()
        })
        .unwrap();
        let err = Backends::default().remote_or_init(&env).unwrap_err();
        assert!(matches!(err, AccessError::Config(_)));
    }

    #[test]
    fn closing_disconnects_every_handle() {
        let db = MemoryDb::sdss5db();
        let mut backends = Backends {
            database: Some(DatabaseHandle::new(DbInput::Connection(db.clone()))),
            ..Backends::default()
        };
        assert!(backends.has_db());

        backends.close();
        backends.close();
        assert!(!backends.is_connected());
        assert_eq!(db.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
