// ─── Multi-Modal Access Engine ───
// Decides where a lookup is served from and drives exactly one load hook per
// attempt. `resolve` is pure; `load`/`load_async` do the I/O, including the
// single auto-mode retry against the api.

use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{debug, info, warn};

use super::identifier::Identifier;
use super::mode::{DataOrigin, Mode};
use super::tool::{AsyncDataTool, DataTool, LoadContext};
use crate::core::auth::{credentials_for, AuthType};
use crate::core::config::AccessEnv;
use crate::core::downloader::{download_file, download_file_async, DownloadEntry};
use crate::core::error::{AccessError, AccessResult};
use crate::core::handles::Backends;
use crate::core::parsing::ParsedInput;
use crate::core::paths::PathSpec;
use crate::core::version::{is_public_release, VersionResolver};

/// Profile name netrc entries for the file archive are looked up under.
const ARCHIVE_PROFILE: &str = "sas";

/// Local resource availability as seen by the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resources {
    pub has_db: bool,
    pub ignore_db: bool,
}

/// Pick the data origin for a lookup. No I/O.
///
/// Filenames are read locally unless the mode is remote. Object ids go to the
/// database when one is usable and not ignored, else to a local file; remote
/// mode always goes to the api.
pub fn resolve(identifier: &Identifier, mode: Mode, resources: Resources) -> DataOrigin {
    let local = if resources.has_db && !resources.ignore_db {
        DataOrigin::Db
    } else {
        DataOrigin::File
    };
    match (identifier, mode) {
        (_, Mode::Remote) => DataOrigin::Api,
        (Identifier::Filename(_), Mode::Local | Mode::Auto) => DataOrigin::File,
        (Identifier::ObjectId(_), Mode::Local | Mode::Auto) => local,
    }
}

/// Inputs of one load, fixed for its duration.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub identifier: &'a Identifier,
    pub parsed: &'a ParsedInput,
    pub mode: Mode,
    pub release: &'a str,
    pub ignore_db: bool,
    /// Fetch a missing local file from the archive before loading it.
    pub download: bool,
    pub path_spec: &'a PathSpec,
    pub versions: &'a VersionResolver,
    pub env: &'a AccessEnv,
}

impl<'a> LoadRequest<'a> {
    pub fn context(&self) -> LoadContext<'a> {
        LoadContext {
            identifier: self.identifier,
            parsed: self.parsed,
            release: self.release,
            path_spec: self.path_spec,
            versions: self.versions,
        }
    }

    pub fn resources(&self, backends: &Backends) -> Resources {
        Resources {
            has_db: backends.has_db(),
            ignore_db: self.ignore_db,
        }
    }

    fn may_fall_back(&self, origin: DataOrigin, err: &AccessError) -> bool {
        self.mode == Mode::Auto
            && !self.identifier.is_filename()
            && origin.is_local()
            && err.is_fallback_eligible()
    }
}

/// Outcome of a load.
#[derive(Debug)]
pub struct Resolution<P> {
    pub origin: DataOrigin,
    pub payload: P,
    /// The local failure an auto-mode lookup recovered from, if any.
    pub fallback_cause: Option<AccessError>,
}

enum FileTarget {
    Ready(PathBuf),
    Fetch(PathBuf),
    Missing(PathBuf),
}

/// Materialize the local file for the request.
///
/// An object id whose template cannot be filled is a file load failure, so
/// auto mode may still serve it from the api.
fn file_target(req: &LoadRequest<'_>) -> AccessResult<FileTarget> {
    let path = match req.identifier {
        Identifier::Filename(path) => path.clone(),
        Identifier::ObjectId(id) => object_path(req, id)
            .map_err(|e| AccessError::load(DataOrigin::File, e))?,
    };

    if path.exists() {
        Ok(FileTarget::Ready(path))
    } else if req.download && !req.identifier.is_filename() {
        Ok(FileTarget::Fetch(path))
    } else {
        Ok(FileTarget::Missing(path))
    }
}

fn object_path(req: &LoadRequest<'_>, id: &str) -> AccessResult<PathBuf> {
    if !req.path_spec.is_configured() {
        return Err(AccessError::PathConfiguration(format!(
            "no path template name and parameters set for object id {id}"
        )));
    }
    req.env.templates().full(req.path_spec, req.release)
}

fn download_entry(req: &LoadRequest<'_>, dest: &Path) -> AccessResult<DownloadEntry> {
    let url = req.env.templates().url(req.path_spec, req.release)?;
    let entry = DownloadEntry::new(url, dest);
    if is_public_release(req.release) {
        return Ok(entry);
    }
    let host = Url::parse(&entry.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    let credentials = credentials_for(
        AuthType::Netrc,
        ARCHIVE_PROFILE,
        &host,
        &req.env.settings().netrc_path,
    )?;
    Ok(entry.with_credentials(credentials))
}

fn missing(path: PathBuf) -> AccessError {
    AccessError::load(DataOrigin::File, AccessError::FileNotFound(path))
}

fn no_database() -> AccessError {
    AccessError::load(
        DataOrigin::Db,
        AccessError::Database("no connected database handle".into()),
    )
}

fn fall_back<P>(
    origin: DataOrigin,
    local: AccessError,
    remote: AccessResult<P>,
) -> AccessResult<Resolution<P>> {
    match remote {
        Ok(payload) => {
            info!("Recovered from local {origin} failure through the api");
            Ok(Resolution {
                origin: DataOrigin::Api,
                payload,
                fallback_cause: Some(local),
            })
        }
        Err(remote) => Err(AccessError::FallbackFailed {
            local: Box::new(local),
            remote: Box::new(remote),
        }),
    }
}

/// Resolve and load with a blocking tool.
pub fn load<T: DataTool>(
    tool: &T,
    req: &LoadRequest<'_>,
    backends: &mut Backends,
) -> AccessResult<Resolution<T::Payload>> {
    let origin = resolve(req.identifier, req.mode, req.resources(backends));
    info!(
        "{}: {} in {} mode resolved to {origin}",
        tool.name(),
        req.identifier,
        req.mode
    );

    match load_origin(tool, req, backends, origin) {
        Ok(payload) => Ok(Resolution {
            origin,
            payload,
            fallback_cause: None,
        }),
        Err(local) if req.may_fall_back(origin, &local) => {
            warn!("{}: {local}; retrying against the api", tool.name());
            let remote = load_origin(tool, req, backends, DataOrigin::Api);
            fall_back(origin, local, remote)
        }
        Err(e) => Err(e),
    }
}

fn load_origin<T: DataTool>(
    tool: &T,
    req: &LoadRequest<'_>,
    backends: &mut Backends,
    origin: DataOrigin,
) -> AccessResult<T::Payload> {
    let ctx = req.context();
    match origin {
        DataOrigin::File => {
            let path = match file_target(req)? {
                FileTarget::Ready(path) => path,
                FileTarget::Missing(path) => return Err(missing(path)),
                FileTarget::Fetch(path) => {
                    download_entry(req, &path)
                        .and_then(|entry| download_file(&entry))
                        .map_err(|e| AccessError::load(DataOrigin::File, e))?;
                    path
                }
            };
            debug!("Loading from file {:?}", path);
            tool.load_from_file(&ctx, &path)
                .map_err(|e| AccessError::load(DataOrigin::File, e))
        }
        DataOrigin::Db => {
            let db = backends
                .database
                .as_ref()
                .filter(|_| backends.has_db())
                .ok_or_else(no_database)?;
            tool.load_from_db(&ctx, db)
                .map_err(|e| AccessError::load(DataOrigin::Db, e))
        }
        DataOrigin::Api => {
            let remote = backends.remote_or_init(req.env)?;
            tool.load_from_api(&ctx, remote)
                .map_err(|e| AccessError::load(DataOrigin::Api, e))
        }
    }
}

/// Resolve and load with an async tool.
pub async fn load_async<T: AsyncDataTool>(
    tool: &T,
    req: &LoadRequest<'_>,
    backends: &mut Backends,
) -> AccessResult<Resolution<T::Payload>> {
    let origin = resolve(req.identifier, req.mode, req.resources(backends));
    info!(
        "{}: {} in {} mode resolved to {origin}",
        tool.name(),
        req.identifier,
        req.mode
    );

    match load_origin_async(tool, req, backends, origin).await {
        Ok(payload) => Ok(Resolution {
            origin,
            payload,
            fallback_cause: None,
        }),
        Err(local) if req.may_fall_back(origin, &local) => {
            warn!("{}: {local}; retrying against the api", tool.name());
            let remote = load_origin_async(tool, req, backends, DataOrigin::Api).await;
            fall_back(origin, local, remote)
        }
        Err(e) => Err(e),
    }
}

async fn load_origin_async<T: AsyncDataTool>(
    tool: &T,
    req: &LoadRequest<'_>,
    backends: &mut Backends,
    origin: DataOrigin,
) -> AccessResult<T::Payload> {
    let ctx = req.context();
    match origin {
        DataOrigin::File => {
            let path = match file_target(req)? {
                FileTarget::Ready(path) => path,
                FileTarget::Missing(path) => return Err(missing(path)),
                FileTarget::Fetch(path) => {
                    let entry = download_entry(req, &path)
                        .map_err(|e| AccessError::load(DataOrigin::File, e))?;
                    download_file_async(&entry)
                        .await
                        .map_err(|e| AccessError::load(DataOrigin::File, e))?;
                    path
                }
            };
            debug!("Loading from file {:?}", path);
            tool.load_from_file(&ctx, &path)
                .await
                .map_err(|e| AccessError::load(DataOrigin::File, e))
        }
        DataOrigin::Db => {
            let db = backends
                .database
                .as_ref()
                .filter(|_| backends.has_db())
                .ok_or_else(no_database)?;
            tool.load_from_db(&ctx, db)
                .await
                .map_err(|e| AccessError::load(DataOrigin::Db, e))
        }
        DataOrigin::Api => {
            let remote = backends.remote_or_init(req.env)?;
            tool.load_from_api(&ctx, remote)
                .await
                .map_err(|e| AccessError::load(DataOrigin::Api, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::core::handles::database::fakes::MemoryDb;
    use crate::core::handles::{ClientKind, DatabaseHandle, DbInput, RemoteHandle};
    use crate::core::mma::{Tool, ToolSpec};
    use crate::core::version::VersionBundle;
    use async_trait::async_trait;
    use serial_test::serial;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    const RELEASE: &str = "DR17";

    struct Recorder {
        spec: ToolSpec,
        fail: Vec<DataOrigin>,
        calls: Mutex<Vec<DataOrigin>>,
    }

    impl Recorder {
        fn new(env: &AccessEnv, fail: &[DataOrigin]) -> Self {
            let spec = ToolSpec::builder()
                .path_name("mangacube")
                .default_param("wave", "LOG")
                .mapped_version("manga:drpver")
                .keymap("plate", r"\d{4,5}")
                .keymap("ifu", r"\d{3,5}")
                .build(env.templates())
                .unwrap();
            Self {
                spec,
                fail: fail.to_vec(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, origin: DataOrigin) -> AccessResult<()> {
            self.calls.lock().unwrap().push(origin);
            if self.fail.contains(&origin) {
                return Err(AccessError::Database(format!("simulated {origin} failure")));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<DataOrigin> {
            self.calls.lock().unwrap().clone()
        }

        fn api_payload(ctx: &LoadContext<'_>, remote: &mut RemoteHandle) -> AccessResult<String> {
            remote.load_url("cubes/{plateifu}/")?;
            let plateifu = ctx.parsed.objectid.clone().unwrap_or_default();
            remote.resolve_url(&BTreeMap::from([("plateifu".to_string(), plateifu)]))?;
            assert!(remote.has_valid_url());
            Ok(format!("api:{}", remote.full_url().unwrap_or_default()))
        }
    }

    impl Tool for Recorder {
        type Payload = String;

        fn name(&self) -> &str {
            "recorder"
        }

        fn spec(&self) -> Option<&ToolSpec> {
            Some(&self.spec)
        }
    }

    impl DataTool for Recorder {
        fn load_from_file(&self, _ctx: &LoadContext<'_>, path: &Path) -> AccessResult<String> {
            self.record(DataOrigin::File)?;
            Ok(format!("file:{}", path.display()))
        }

        fn load_from_db(&self, _ctx: &LoadContext<'_>, db: &DatabaseHandle) -> AccessResult<String> {
            self.record(DataOrigin::Db)?;
            Ok(format!("db:{}", db.dbname().unwrap_or_default()))
        }

        fn load_from_api(
            &self,
            ctx: &LoadContext<'_>,
            remote: &mut RemoteHandle,
        ) -> AccessResult<String> {
            self.record(DataOrigin::Api)?;
            Self::api_payload(ctx, remote)
        }
    }

    struct AsyncRecorder(Recorder);

    impl Tool for AsyncRecorder {
        type Payload = String;

        fn name(&self) -> &str {
            "async-recorder"
        }

        fn spec(&self) -> Option<&ToolSpec> {
            Some(&self.0.spec)
        }
    }

    #[async_trait]
    impl AsyncDataTool for AsyncRecorder {
        async fn load_from_file(&self, _ctx: &LoadContext<'_>, path: &Path) -> AccessResult<String> {
            self.0.record(DataOrigin::File)?;
            Ok(format!("file:{}", path.display()))
        }

        async fn load_from_db(
            &self,
            _ctx: &LoadContext<'_>,
            _db: &DatabaseHandle,
        ) -> AccessResult<String> {
            self.0.record(DataOrigin::Db)?;
            Ok("db".into())
        }

        async fn load_from_api(
            &self,
            ctx: &LoadContext<'_>,
            remote: &mut RemoteHandle,
        ) -> AccessResult<String> {
            self.0.record(DataOrigin::Api)?;
            Recorder::api_payload(ctx, remote)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        env: AccessEnv,
        versions: VersionResolver,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_archive(Settings::default().sas_url)
        }

        fn with_archive(sas_url: impl Into<String>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let env = AccessEnv::new(Settings {
                sas_base_dir: dir.path().to_path_buf(),
                sas_url: sas_url.into(),
                ..Settings::default()
            })
            .unwrap();
            let versions = env.version_resolver(&VersionBundle::new(), &VersionBundle::new());
            Self {
                _dir: dir,
                env,
                versions,
            }
        }

        fn cube_path(&self) -> PathBuf {
            let spec = PathSpec::new("mangacube")
                .with_param("drpver", "v3_1_1")
                .with_param("plate", "8485")
                .with_param("ifu", "1901")
                .with_param("wave", "LOG");
            self.env.templates().full(&spec, RELEASE).unwrap()
        }

        fn touch_cube(&self) -> PathBuf {
            let path = self.cube_path();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"cube").unwrap();
            path
        }

        fn run(
            &self,
            tool: &Recorder,
            input: &str,
            mode: Mode,
            backends: &mut Backends,
        ) -> AccessResult<Resolution<String>> {
            self.run_with(tool, input, mode, backends, false)
        }

        fn run_with(
            &self,
            tool: &Recorder,
            input: &str,
            mode: Mode,
            backends: &mut Backends,
            download: bool,
        ) -> AccessResult<Resolution<String>> {
            let parsed = tool.parse_input(input)?;
            let identifier = Identifier::from_parsed(&parsed)?;
            let path_spec = match identifier {
                Identifier::ObjectId(_) => {
                    tool.access_path_params(&parsed, &self.versions, RELEASE)?
                }
                Identifier::Filename(_) => PathSpec::default(),
            };
            let req = LoadRequest {
                identifier: &identifier,
                parsed: &parsed,
                mode,
                release: RELEASE,
                ignore_db: false,
                download,
                path_spec: &path_spec,
                versions: &self.versions,
                env: &self.env,
            };
            load(tool, &req, backends)
        }
    }

    fn with_db() -> Backends {
        Backends {
            database: Some(DatabaseHandle::new(DbInput::Connection(MemoryDb::sdss5db()))),
            ..Backends::default()
        }
    }

    #[test]
    fn resolution_is_pure_and_honours_the_mode_contract() {
        let ids = [
            Identifier::Filename(PathBuf::from("/tmp/x.fits")),
            Identifier::ObjectId("8485-1901".into()),
        ];
        for id in &ids {
            for mode in [Mode::Auto, Mode::Local, Mode::Remote] {
                for has_db in [false, true] {
                    for ignore_db in [false, true] {
                        let res = Resources { has_db, ignore_db };
                        let origin = resolve(id, mode, res);
                        assert_eq!(origin, resolve(id, mode, res));

                        let expected = match (id.is_filename(), mode) {
                            (_, Mode::Remote) => DataOrigin::Api,
                            (true, _) => DataOrigin::File,
                            (false, _) if has_db && !ignore_db => DataOrigin::Db,
                            (false, _) => DataOrigin::File,
                        };
                        assert_eq!(origin, expected, "{id} {mode} {res:?}");
                    }
                }
            }
        }
    }

    #[test]
    #[serial]
    fn auto_mode_reads_a_present_local_file() {
        let fx = Fixture::new();
        let path = fx.touch_cube();
        let tool = Recorder::new(&fx.env, &[]);

        let parsed = tool.parse_input("8485-1901").unwrap();
        assert_eq!(parsed.field("plate"), Some("8485"));
        assert_eq!(parsed.field("ifu"), Some("1901"));

        let res = fx
            .run(&tool, "8485-1901", Mode::Auto, &mut Backends::default())
            .unwrap();
        assert_eq!(res.origin, DataOrigin::File);
        assert_eq!(res.payload, format!("file:{}", path.display()));
        assert!(res.fallback_cause.is_none());
        assert_eq!(tool.calls(), vec![DataOrigin::File]);
    }

    #[test]
    #[serial]
    fn local_mode_prefers_an_attached_database() {
        let fx = Fixture::new();
        fx.touch_cube();
        let tool = Recorder::new(&fx.env, &[]);

        let res = fx
            .run(&tool, "8485-1901", Mode::Local, &mut with_db())
            .unwrap();
        assert_eq!(res.origin, DataOrigin::Db);
        assert_eq!(res.payload, "db:sdss5db");
    }

    #[test]
    fn remote_mode_resolves_url_parameters() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[]);

        let res = fx
            .run(&tool, "8485-1901", Mode::Remote, &mut Backends::default())
            .unwrap();
        assert_eq!(res.origin, DataOrigin::Api);
        assert!(res.payload.contains("cubes/8485-1901"));
        assert!(!res.payload.contains('{'));
        assert_eq!(tool.calls(), vec![DataOrigin::Api]);
    }

    #[test]
    #[serial]
    fn missing_local_file_falls_back_once_in_auto_mode() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[]);

        let res = fx
            .run(&tool, "8485-1901", Mode::Auto, &mut Backends::default())
            .unwrap();
        assert_eq!(res.origin, DataOrigin::Api);
        assert_eq!(tool.calls(), vec![DataOrigin::Api]);
        match res.fallback_cause {
            Some(AccessError::Load { origin, source }) => {
                assert_eq!(origin, DataOrigin::File);
                assert!(matches!(*source, AccessError::FileNotFound(_)));
            }
            other => panic!("unexpected fallback cause {other:?}"),
        }
    }

    #[test]
    fn failing_database_hook_falls_back_once_in_auto_mode() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[DataOrigin::Db]);

        let res = fx
            .run(&tool, "8485-1901", Mode::Auto, &mut with_db())
            .unwrap();
        assert_eq!(res.origin, DataOrigin::Api);
        assert_eq!(tool.calls(), vec![DataOrigin::Db, DataOrigin::Api]);
        assert_eq!(
            res.fallback_cause.as_ref().and_then(AccessError::origin),
            Some(DataOrigin::Db)
        );
    }

    #[test]
    fn local_mode_surfaces_load_failures() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[DataOrigin::Db]);

        let err = fx
            .run(&tool, "8485-1901", Mode::Local, &mut with_db())
            .unwrap_err();
        assert_eq!(err.origin(), Some(DataOrigin::Db));
        assert_eq!(tool.calls(), vec![DataOrigin::Db]);
    }

    #[test]
    fn failed_fallback_keeps_both_causes() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[DataOrigin::Db, DataOrigin::Api]);

        let err = fx
            .run(&tool, "8485-1901", Mode::Auto, &mut with_db())
            .unwrap_err();
        assert_eq!(tool.calls(), vec![DataOrigin::Db, DataOrigin::Api]);
        match err {
            AccessError::FallbackFailed { local, remote } => {
                assert_eq!(local.origin(), Some(DataOrigin::Db));
                assert_eq!(remote.origin(), Some(DataOrigin::Api));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    fn is_unfilled_path(err: &AccessError) -> bool {
        matches!(
            err,
            AccessError::Load { origin: DataOrigin::File, source }
                if matches!(**source, AccessError::PathConfiguration(_))
        )
    }

    #[test]
    fn unfillable_object_path_falls_back_in_auto_mode() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[]);

        let res = fx
            .run(&tool, "1-209232x", Mode::Auto, &mut Backends::default())
            .unwrap();
        assert_eq!(res.origin, DataOrigin::Api);
        assert!(res.payload.contains("cubes/1-209232x"));
        assert!(res.fallback_cause.as_ref().is_some_and(is_unfilled_path));
        assert_eq!(tool.calls(), vec![DataOrigin::Api]);
    }

    #[test]
    fn unfillable_object_path_surfaces_in_local_mode() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[]);

        let err = fx
            .run(&tool, "not-an-id", Mode::Local, &mut Backends::default())
            .unwrap_err();
        assert!(is_unfilled_path(&err), "{err}");
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn resolution_phase_errors_never_fall_back() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[]);

        let parsed = tool.parse_input("8485-1901").unwrap();
        let err = tool
            .access_path_params(&parsed, &fx.versions, "DR99")
            .unwrap_err();
        assert!(matches!(err, AccessError::ReleaseNotFound { .. }));
        assert!(!err.is_fallback_eligible());
    }

    fn is_failed_download(err: &AccessError) -> bool {
        matches!(
            err,
            AccessError::Load { origin: DataOrigin::File, source }
                if matches!(**source, AccessError::Http(_))
        )
    }

    #[test]
    #[serial]
    fn failed_download_surfaces_in_local_mode() {
        let fx = Fixture::with_archive("http://127.0.0.1:9/sas");
        let tool = Recorder::new(&fx.env, &[]);

        let err = fx
            .run_with(&tool, "8485-1901", Mode::Local, &mut Backends::default(), true)
            .unwrap_err();
        assert!(is_failed_download(&err), "{err}");
        assert!(tool.calls().is_empty());

        let path = fx.cube_path();
        assert!(!path.exists());
        let mut part = path.into_os_string();
        part.push(".part");
        assert!(!PathBuf::from(part).exists());
    }

    #[test]
    #[serial]
    fn failed_download_falls_back_in_auto_mode() {
        let fx = Fixture::with_archive("http://127.0.0.1:9/sas");
        let tool = Recorder::new(&fx.env, &[]);

        let res = fx
            .run_with(&tool, "8485-1901", Mode::Auto, &mut Backends::default(), true)
            .unwrap();
        assert_eq!(res.origin, DataOrigin::Api);
        assert!(res.fallback_cause.as_ref().is_some_and(is_failed_download));
        assert_eq!(tool.calls(), vec![DataOrigin::Api]);
        assert!(!fx.cube_path().exists());
    }

    #[test]
    #[serial]
    fn present_file_is_not_downloaded_again() {
        let fx = Fixture::with_archive("http://127.0.0.1:9/sas");
        let path = fx.touch_cube();
        let tool = Recorder::new(&fx.env, &[]);

        let res = fx
            .run_with(&tool, "8485-1901", Mode::Local, &mut Backends::default(), true)
            .unwrap();
        assert_eq!(res.origin, DataOrigin::File);
        assert_eq!(res.payload, format!("file:{}", path.display()));
    }

    #[test]
    fn missing_filename_input_surfaces_in_auto_mode() {
        let fx = Fixture::new();
        let tool = Recorder::new(&fx.env, &[]);

        let err = fx
            .run(&tool, "/no/such/cube.fits.gz", Mode::Auto, &mut Backends::default())
            .unwrap_err();
        assert_eq!(err.origin(), Some(DataOrigin::File));
        assert!(tool.calls().is_empty());
    }

    #[test]
    #[serial]
    fn ignore_db_sends_local_lookups_to_files() {
        let fx = Fixture::new();
        fx.touch_cube();
        let tool = Recorder::new(&fx.env, &[]);

        let parsed = tool.parse_input("8485-1901").unwrap();
        let identifier = Identifier::from_parsed(&parsed).unwrap();
        let path_spec = tool
            .access_path_params(&parsed, &fx.versions, RELEASE)
            .unwrap();
        let req = LoadRequest {
            identifier: &identifier,
            parsed: &parsed,
            mode: Mode::Local,
            release: RELEASE,
            ignore_db: true,
            download: false,
            path_spec: &path_spec,
            versions: &fx.versions,
            env: &fx.env,
        };
        let res = load(&tool, &req, &mut with_db()).unwrap();
        assert_eq!(res.origin, DataOrigin::File);
    }

    #[tokio::test]
    async fn async_tools_share_the_resolution() {
        let fx = Fixture::new();
        let tool = AsyncRecorder(Recorder::new(&fx.env, &[]));

        let parsed = tool.parse_input("8485-1901").unwrap();
        let identifier = Identifier::from_parsed(&parsed).unwrap();
        let path_spec = tool
            .access_path_params(&parsed, &fx.versions, RELEASE)
            .unwrap();
        let req = LoadRequest {
            identifier: &identifier,
            parsed: &parsed,
            mode: Mode::Auto,
            release: RELEASE,
            ignore_db: false,
            download: false,
            path_spec: &path_spec,
            versions: &fx.versions,
            env: &fx.env,
        };
        let mut backends = Backends {
            client: ClientKind::Async,
            ..Backends::default()
        };

        let res = load_async(&tool, &req, &mut backends).await.unwrap();
        assert_eq!(res.origin, DataOrigin::Api);
        assert!(res.fallback_cause.is_some());
        assert_eq!(backends.remote.as_ref().map(|r| r.kind()), Some(ClientKind::Async));
    }
}
