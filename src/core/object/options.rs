use crate::core::config::AccessEnv;
use crate::core::handles::{ClientKind, DatabaseHandle, RemoteInput};
use crate::core::mma::Mode;
use crate::core::version::VersionBundle;

/// Per-object construction options. Anything left unset comes from the
/// environment's settings.
#[derive(Debug, Clone, Default)]
pub struct AccessOptions {
    pub mode: Option<Mode>,
    pub release: Option<String>,
    pub ignore_db: Option<bool>,
    pub download: Option<bool>,
    /// Per-call work versions; only valid with the `WORK` release.
    pub work_versions: VersionBundle,
    pub database: Option<DatabaseHandle>,
    pub remote: Option<RemoteInput>,
    pub client: ClientKind,
    /// Environment snapshot to use instead of the process-wide one.
    pub env: Option<AccessEnv>,
}

impl AccessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn ignore_db(mut self, ignore: bool) -> Self {
        self.ignore_db = Some(ignore);
        self
    }

    pub fn download(mut self, download: bool) -> Self {
        self.download = Some(download);
        self
    }

    pub fn work_version(mut self, key: impl Into<String>, version: impl Into<String>) -> Self {
        self.work_versions.insert(key.into(), version.into());
        self
    }

    pub fn work_versions(mut self, versions: VersionBundle) -> Self {
        self.work_versions.extend(versions);
        self
    }

    pub fn database(mut self, handle: DatabaseHandle) -> Self {
        self.database = Some(handle);
        self
    }

    pub fn remote(mut self, input: RemoteInput) -> Self {
        self.remote = Some(input);
        self
    }

    pub fn client(mut self, kind: ClientKind) -> Self {
        self.client = kind;
        self
    }

    pub fn env(mut self, env: AccessEnv) -> Self {
        self.env = Some(env);
        self
    }
}
