use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::defaults::tool_defaults;
use super::options::AccessOptions;
use crate::core::config::AccessEnv;
use crate::core::error::{AccessError, AccessResult};
use crate::core::handles::{Backends, ClientKind, DatabaseHandle, RemoteHandle, ResourceHandle};
use crate::core::mma::{
    engine, AsyncDataTool, DataOrigin, DataTool, Identifier, LoadRequest, Mode, Resolution, Tool,
};
use crate::core::parsing::ParsedInput;
use crate::core::paths::PathSpec;
use crate::core::version::{canonical_release, is_work_release, VersionResolver, WORK_RELEASE};

/// Lifecycle state of a data object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectState {
    /// Parsed and resolved, payload not loaded yet.
    Unloaded,
    Loaded,
    /// Resources released. Terminal.
    Closed,
}

/// One logical piece of archive data: identity, handles and payload.
///
/// Construction parses, resolves and loads; an object that exists is loaded.
/// Resources are released by `close`, by leaving `scoped`, or on drop.
pub struct DataObject<T: Tool> {
    id: Uuid,
    tool: T,
    input: String,
    identifier: Identifier,
    parsed: ParsedInput,
    mode: Mode,
    release: String,
    ignore_db: bool,
    download: bool,
    path_spec: PathSpec,
    versions: VersionResolver,
    backends: Backends,
    origin: Option<DataOrigin>,
    payload: Option<T::Payload>,
    fallback_cause: Option<AccessError>,
    state: ObjectState,
    created_at: DateTime<Utc>,
    loaded_at: Option<DateTime<Utc>>,
    env: AccessEnv,
}

impl<T: Tool> DataObject<T> {
    /// Everything up to, not including, the load.
    fn prepare(tool: T, input: &str, options: AccessOptions) -> AccessResult<Self> {
        let AccessOptions {
            mode,
            release,
            ignore_db,
            download,
            work_versions,
            database,
            remote,
            client,
            env,
        } = options;

        let env = match env {
            Some(env) => env,
            None => AccessEnv::global()?,
        };
        let settings = env.settings();
        let mode = mode.unwrap_or(settings.mode);
        let release = canonical_release(release.as_deref().unwrap_or(&settings.release));
        let ignore_db = ignore_db.unwrap_or(settings.ignore_db);
        let download = download.unwrap_or(settings.download);

        if !work_versions.is_empty() && !is_work_release(&release) {
            return Err(AccessError::Config(format!(
                "work versions can only be set with release {WORK_RELEASE}, not {release}"
            )));
        }

        let defaults = tool_defaults(tool.name());
        let versions = env.version_resolver(&defaults.work_versions, &work_versions);
        if is_work_release(&release) {
            versions.get_bundle(None, &release)?;
        }

        let mut parsed = tool.parse_input(input)?;
        let identifier = Identifier::from_parsed(&parsed)?;
        let path_spec = match &identifier {
            Identifier::ObjectId(_) => tool.access_path_params(&parsed, &versions, &release)?,
            Identifier::Filename(path) => {
                let params = match tool.spec() {
                    Some(spec) => spec
                        .params_from_filename(env.templates(), path)?
                        .map(|p| (spec.path_name().unwrap_or_default().to_string(), p)),
                    None => None,
                };
                match params {
                    Some((name, params)) => {
                        let mut spec = PathSpec::new(name);
                        for (key, value) in params {
                            parsed
                                .fields
                                .entry(key.clone())
                                .or_insert_with(|| Some(value.clone()));
                            spec.set(key, Some(value));
                        }
                        spec
                    }
                    None => PathSpec::default(),
                }
            }
        };

        let backends = Backends {
            database: database.or(defaults.database),
            remote: None,
            remote_input: remote,
            client,
        };

        let object = Self {
            id: Uuid::new_v4(),
            tool,
            input: input.to_string(),
            identifier,
            parsed,
            mode,
            release,
            ignore_db,
            download,
            path_spec,
            versions,
            backends,
            origin: None,
            payload: None,
            fallback_cause: None,
            state: ObjectState::Unloaded,
            created_at: Utc::now(),
            loaded_at: None,
            env,
        };
        debug!(
            "Prepared {} object {} for {} ({} mode, release {})",
            object.tool.name(),
            object.id,
            object.identifier,
            object.mode,
            object.release
        );
        Ok(object)
    }

    fn ensure_open(&self) -> AccessResult<()> {
        if self.state == ObjectState::Closed {
            return Err(AccessError::Config(format!("data object {} is closed", self.id)));
        }
        Ok(())
    }

    fn finish(&mut self, resolution: Resolution<T::Payload>) {
        if let Some(mut previous) = self.payload.take() {
            self.tool.close_payload(&mut previous);
        }
        if let Some(cause) = &resolution.fallback_cause {
            info!("Object {} served by the api after: {cause}", self.id);
        }
        self.origin = Some(resolution.origin);
        self.payload = Some(resolution.payload);
        self.fallback_cause = resolution.fallback_cause;
        self.state = ObjectState::Loaded;
        self.loaded_at = Some(Utc::now());
    }

    /// Swap in a new database handle, closing the one it replaces.
    fn replace_database(&mut self, handle: DatabaseHandle) {
        if let Some(mut previous) = self.backends.database.replace(handle) {
            previous.close();
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn parsed(&self) -> &ParsedInput {
        &self.parsed
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        self.origin
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    pub fn versions(&self) -> &VersionResolver {
        &self.versions
    }

    /// A version parameter of this object's release.
    pub fn version(&self, key: &str) -> AccessResult<String> {
        self.versions.get_version(None, &self.release, key)
    }

    pub fn database(&self) -> Option<&DatabaseHandle> {
        self.backends.database.as_ref()
    }

    pub fn remote(&self) -> Option<&RemoteHandle> {
        self.backends.remote.as_ref()
    }

    pub fn payload(&self) -> Option<&T::Payload> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut T::Payload> {
        self.payload.as_mut()
    }

    /// Move the payload out. The object keeps its handles until closed.
    pub fn take_payload(&mut self) -> Option<T::Payload> {
        self.payload.take()
    }

    /// The local failure an auto-mode lookup recovered from.
    pub fn fallback_cause(&self) -> Option<&AccessError> {
        self.fallback_cause.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Local file behind the object: the input filename, or the filled
    /// path template.
    pub fn local_path(&self) -> AccessResult<PathBuf> {
        match &self.identifier {
            Identifier::Filename(path) => Ok(path.clone()),
            Identifier::ObjectId(_) => self.env.templates().full(&self.path_spec, &self.release),
        }
    }

    /// Whether any backend handle is still live.
    pub fn is_connected(&self) -> bool {
        self.state != ObjectState::Closed && self.backends.is_connected()
    }

    /// Release payload resources and handles. Idempotent.
    pub fn close(&mut self) {
        if self.state == ObjectState::Closed {
            return;
        }
        if let Some(payload) = self.payload.as_mut() {
            self.tool.close_payload(payload);
        }
        self.backends.close();
        self.state = ObjectState::Closed;
        debug!("Closed {} object {}", self.tool.name(), self.id);
    }

    /// Run `f` on the object, then close it whatever `f` returned.
    pub fn scoped<R>(mut self, f: impl FnOnce(&mut Self) -> AccessResult<R>) -> AccessResult<R> {
        let out = f(&mut self);
        self.close();
        out
    }
}

impl<T: DataTool> DataObject<T> {
    /// Parse `input`, resolve its origin and load it.
    pub fn open(tool: T, input: &str, options: AccessOptions) -> AccessResult<Self> {
        let mut object = Self::prepare(tool, input, options)?;
        object.load()?;
        Ok(object)
    }

    /// Attach a new database handle and resolve the object again.
    pub fn set_database(&mut self, handle: DatabaseHandle) -> AccessResult<()> {
        self.ensure_open()?;
        self.replace_database(handle);
        self.load()
    }

    fn load(&mut self) -> AccessResult<()> {
        let resolution = {
            let req = LoadRequest {
                identifier: &self.identifier,
                parsed: &self.parsed,
                mode: self.mode,
                release: &self.release,
                ignore_db: self.ignore_db,
                download: self.download,
                path_spec: &self.path_spec,
                versions: &self.versions,
                env: &self.env,
            };
            engine::load(&self.tool, &req, &mut self.backends)
        }?;
        self.finish(resolution);
        Ok(())
    }
}

impl<T: AsyncDataTool> DataObject<T> {
    /// Async twin of [`DataObject::open`]; remote requests use the async client.
    pub async fn open_async(tool: T, input: &str, options: AccessOptions) -> AccessResult<Self> {
        let mut object = Self::prepare(tool, input, options.client(ClientKind::Async))?;
        object.load_async().await?;
        Ok(object)
    }

    pub async fn set_database_async(&mut self, handle: DatabaseHandle) -> AccessResult<()> {
        self.ensure_open()?;
        self.replace_database(handle);
        self.load_async().await
    }

    async fn load_async(&mut self) -> AccessResult<()> {
        let resolution = {
            let req = LoadRequest {
                identifier: &self.identifier,
                parsed: &self.parsed,
                mode: self.mode,
                release: &self.release,
                ignore_db: self.ignore_db,
                download: self.download,
                path_spec: &self.path_spec,
                versions: &self.versions,
                env: &self.env,
            };
            engine::load_async(&self.tool, &req, &mut self.backends).await
        }?;
        self.finish(resolution);
        Ok(())
    }
}

impl<T: Tool> fmt::Debug for DataObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObject")
            .field("id", &self.id)
            .field("tool", &self.tool.name())
            .field("identifier", &self.identifier)
            .field("mode", &self.mode)
            .field("release", &self.release)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Tool> Drop for DataObject<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::core::handles::database::fakes::MemoryDb;
    use crate::core::handles::DbInput;
    use crate::core::mma::{LoadContext, ToolSpec};
    use crate::core::object::defaults::{clear_tool_defaults, set_default_database};
    use serial_test::serial;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CubeTool {
        name: &'static str,
        spec: ToolSpec,
        payload_closes: Arc<AtomicUsize>,
    }

    impl CubeTool {
        fn new(name: &'static str, env: &AccessEnv) -> Self {
            let spec = ToolSpec::builder()
                .path_name("mangacube")
                .default_param("wave", "LOG")
                .mapped_version("manga:drpver")
                .keymap("plate", r"\d{4,5}")
                .keymap("ifu", r"\d{3,5}")
                .build(env.templates())
                .unwrap();
            Self {
                name,
                spec,
                payload_closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Tool for CubeTool {
        type Payload = String;

        fn name(&self) -> &str {
            self.name
        }

        fn spec(&self) -> Option<&ToolSpec> {
            Some(&self.spec)
        }

        fn close_payload(&self, _payload: &mut String) {
            self.payload_closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl DataTool for CubeTool {
        fn load_from_file(&self, _ctx: &LoadContext<'_>, path: &Path) -> AccessResult<String> {
            Ok(std::fs::read_to_string(path)?)
        }

        fn load_from_db(&self, ctx: &LoadContext<'_>, db: &DatabaseHandle) -> AccessResult<String> {
            Ok(format!(
                "{}:{}",
                db.dbname().unwrap_or_default(),
                ctx.parsed.objectid.as_deref().unwrap_or_default()
            ))
        }

        fn load_from_api(
            &self,
            ctx: &LoadContext<'_>,
            remote: &mut RemoteHandle,
        ) -> AccessResult<String> {
            remote.load_url("cubes/{plateifu}/")?;
            let plateifu = ctx.parsed.objectid.clone().unwrap_or_default();
            Ok(remote
                .resolve_url(&[("plateifu".to_string(), plateifu)].into())?
                .to_string())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        env: AccessEnv,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let env = AccessEnv::new(Settings {
                sas_base_dir: dir.path().to_path_buf(),
                ..Settings::default()
            })
            .unwrap();
            Self { _dir: dir, env }
        }

        fn options(&self) -> AccessOptions {
            AccessOptions::new().env(self.env.clone()).release("DR17")
        }

        fn touch_cube(&self) -> PathBuf {
            let spec = PathSpec::new("mangacube")
                .with_param("drpver", "v3_1_1")
                .with_param("plate", "8485")
                .with_param("ifu", "1901")
                .with_param("wave", "LOG");
            let path = self.env.templates().full(&spec, "DR17").unwrap();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "cube 8485-1901").unwrap();
            path
        }
    }

    fn connection() -> (Arc<MemoryDb>, DatabaseHandle) {
        let db = MemoryDb::sdss5db();
        let handle = DatabaseHandle::new(DbInput::Connection(db.clone()));
        (db, handle)
    }

    #[test]
    #[serial]
    fn open_loads_a_local_cube() {
        let fx = Fixture::new();
        let path = fx.touch_cube();
        let tool = CubeTool::new("cube-open", &fx.env);

        let obj = DataObject::open(tool, "8485-1901", fx.options().mode(Mode::Auto)).unwrap();
        assert_eq!(obj.state(), ObjectState::Loaded);
        assert_eq!(obj.origin(), Some(DataOrigin::File));
        assert_eq!(obj.payload().map(String::as_str), Some("cube 8485-1901"));
        assert_eq!(obj.local_path().unwrap(), path);
        assert_eq!(obj.parsed().field("ifu"), Some("1901"));
        assert!(!obj.id().is_nil());
        assert!(obj.loaded_at().unwrap() >= obj.created_at());
        assert!(obj.fallback_cause().is_none());
    }

    #[test]
    #[serial]
    fn filename_input_recovers_template_fields() {
        let fx = Fixture::new();
        let path = fx.touch_cube();
        let tool = CubeTool::new("cube-filename", &fx.env);
        let input = path.to_string_lossy().to_string();

        let obj = DataObject::open(tool, &input, fx.options().mode(Mode::Local)).unwrap();
        assert_eq!(obj.origin(), Some(DataOrigin::File));
        assert_eq!(obj.parsed().field("plate"), Some("8485"));
        assert_eq!(obj.path_spec().get("drpver"), Some("v3_1_1"));
        assert_eq!(obj.path_spec().name.as_deref(), Some("mangacube"));
    }

    #[test]
    fn missing_cube_falls_back_to_the_api() {
        let fx = Fixture::new();
        let tool = CubeTool::new("cube-fallback", &fx.env);

        let obj = DataObject::open(tool, "8485-1901", fx.options().mode(Mode::Auto)).unwrap();
        assert_eq!(obj.origin(), Some(DataOrigin::Api));
        assert!(obj.payload().unwrap().ends_with("cubes/8485-1901/"));
        assert!(obj.remote().unwrap().has_valid_url());
        assert_eq!(
            obj.fallback_cause().and_then(AccessError::origin),
            Some(DataOrigin::File)
        );
    }

    #[test]
    fn close_is_idempotent_and_disconnects() {
        let fx = Fixture::new();
        let (db, handle) = connection();
        let tool = CubeTool::new("cube-close", &fx.env);
        let closes = tool.payload_closes.clone();

        let mut obj = DataObject::open(
            tool,
            "8485-1901",
            fx.options().mode(Mode::Local).database(handle),
        )
        .unwrap();
        assert_eq!(obj.origin(), Some(DataOrigin::Db));
        assert_eq!(obj.payload().map(String::as_str), Some("sdss5db:8485-1901"));
        assert!(obj.is_connected());

        obj.close();
        obj.close();
        assert!(!obj.is_connected());
        assert_eq!(obj.state(), ObjectState::Closed);
        assert_eq!(db.closes.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        drop(obj);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_handles() {
        let fx = Fixture::new();
        let (db, handle) = connection();
        let tool = CubeTool::new("cube-drop", &fx.env);
        {
            let _obj = DataObject::open(
                tool,
                "8485-1901",
                fx.options().mode(Mode::Local).database(handle),
            )
            .unwrap();
        }
        assert_eq!(db.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_closes_on_error() {
        let fx = Fixture::new();
        let (db, handle) = connection();
        let tool = CubeTool::new("cube-scoped", &fx.env);

        let obj = DataObject::open(
            tool,
            "8485-1901",
            fx.options().mode(Mode::Local).database(handle),
        )
        .unwrap();
        let out: AccessResult<()> = obj.scoped(|o| {
            assert_eq!(o.origin(), Some(DataOrigin::Db));
            Err(AccessError::Config("boom".into()))
        });
        assert!(out.is_err());
        assert_eq!(db.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_default_database_survives_object_close() {
        let fx = Fixture::new();
        let (db, handle) = connection();
        set_default_database("cube-shared", handle);

        let first = DataObject::open(
            CubeTool::new("cube-shared", &fx.env),
            "8485-1901",
            fx.options().mode(Mode::Local),
        )
        .unwrap();
        assert_eq!(first.origin(), Some(DataOrigin::Db));
        first.scoped(|_| Ok(())).unwrap();
        assert_eq!(db.closes.load(Ordering::SeqCst), 0);

        let second = DataObject::open(
            CubeTool::new("cube-shared", &fx.env),
            "8485-1901",
            fx.options().mode(Mode::Local),
        )
        .unwrap();
        assert_eq!(second.origin(), Some(DataOrigin::Db));
        assert!(second.is_connected());
        clear_tool_defaults("cube-shared");
    }

    #[test]
    #[serial]
    fn set_database_resolves_again() {
        let fx = Fixture::new();
        fx.touch_cube();
        let (_db, handle) = connection();
        let tool = CubeTool::new("cube-set-db", &fx.env);
        let closes = tool.payload_closes.clone();

        let mut obj = DataObject::open(tool, "8485-1901", fx.options().mode(Mode::Local)).unwrap();
        assert_eq!(obj.origin(), Some(DataOrigin::File));

        obj.set_database(handle).unwrap();
        assert_eq!(obj.origin(), Some(DataOrigin::Db));
        assert_eq!(obj.database().and_then(DatabaseHandle::dbname), Some("sdss5db"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        obj.close();
        let (_, other) = connection();
        assert!(obj.set_database(other).is_err());
    }

    #[test]
    fn work_versions_need_the_work_release() {
        let fx = Fixture::new();
        let err = DataObject::open(
            CubeTool::new("cube-work-dr", &fx.env),
            "8485-1901",
            fx.options().work_version("drpver", "v3_1_1"),
        )
        .unwrap_err();
        assert!(matches!(err, AccessError::Config(_)));
    }

    #[test]
    fn work_release_without_versions_fails() {
        let fx = Fixture::new();
        let err = DataObject::open(
            CubeTool::new("cube-work-empty", &fx.env),
            "8485-1901",
            fx.options().release("work"),
        )
        .unwrap_err();
        assert!(matches!(err, AccessError::NoWorkVersions));
    }

    #[test]
    fn per_call_work_versions_fill_the_path() {
        let fx = Fixture::new();
        let obj = DataObject::open(
            CubeTool::new("cube-work", &fx.env),
            "8485-1901",
            fx.options()
                .release("WORK")
                .work_version("drpver", "v3_1_1")
                .mode(Mode::Remote),
        )
        .unwrap();
        assert_eq!(obj.release(), "WORK");
        assert_eq!(obj.path_spec().get("drpver"), Some("v3_1_1"));
        assert_eq!(obj.version("drpver").unwrap(), "v3_1_1");
        assert_eq!(obj.origin(), Some(DataOrigin::Api));
    }

    #[test]
    fn unparseable_input_fails_construction() {
        let fx = Fixture::new();
        let err = DataObject::open(CubeTool::new("cube-empty", &fx.env), "  ", fx.options())
            .unwrap_err();
        assert!(matches!(err, AccessError::Parsing(_)));
    }
}
