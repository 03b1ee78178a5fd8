use std::path::Path;

use async_trait::async_trait;

use super::identifier::Identifier;
use super::spec::ToolSpec;
use crate::core::error::AccessResult;
use crate::core::handles::{DatabaseHandle, RemoteHandle};
use crate::core::parsing::{InputParser, ParsedInput};
use crate::core::paths::PathSpec;
use crate::core::version::VersionResolver;

/// Everything a load hook may consult about the lookup in progress.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    pub identifier: &'a Identifier,
    pub parsed: &'a ParsedInput,
    pub release: &'a str,
    pub path_spec: &'a PathSpec,
    pub versions: &'a VersionResolver,
}

/// Parsing and path capabilities shared by sync and async tools.
pub trait Tool: Send + Sync {
    type Payload: Send;

    /// Key under which per-tool shared defaults are registered.
    fn name(&self) -> &str;

    fn spec(&self) -> Option<&ToolSpec> {
        None
    }

    fn parse_input(&self, value: &str) -> AccessResult<ParsedInput> {
        match self.spec() {
            Some(spec) => spec.parse(value),
            None => InputParser::greedy()?.parse(value),
        }
    }

    fn access_path_params(
        &self,
        parsed: &ParsedInput,
        versions: &VersionResolver,
        release: &str,
    ) -> AccessResult<PathSpec> {
        match self.spec() {
            Some(spec) => spec.path_spec(parsed, versions, release),
            None => Ok(PathSpec::default()),
        }
    }

    /// Release whatever the payload holds open. Called once on close.
    fn close_payload(&self, _payload: &mut Self::Payload) {}
}

/// A tool with blocking load hooks.
pub trait DataTool: Tool {
    fn load_from_file(&self, ctx: &LoadContext<'_>, path: &Path) -> AccessResult<Self::Payload>;

    fn load_from_db(
        &self,
        ctx: &LoadContext<'_>,
        db: &DatabaseHandle,
    ) -> AccessResult<Self::Payload>;

    fn load_from_api(
        &self,
        ctx: &LoadContext<'_>,
        remote: &mut RemoteHandle,
    ) -> AccessResult<Self::Payload>;
}

/// A tool whose load hooks suspend instead of blocking.
#[async_trait]
pub trait AsyncDataTool: Tool {
    async fn load_from_file(
        &self,
        ctx: &LoadContext<'_>,
        path: &Path,
    ) -> AccessResult<Self::Payload>;

    async fn load_from_db(
        &self,
        ctx: &LoadContext<'_>,
        db: &DatabaseHandle,
    ) -> AccessResult<Self::Payload>;

    async fn load_from_api(
        &self,
        ctx: &LoadContext<'_>,
        remote: &mut RemoteHandle,
    ) -> AccessResult<Self::Payload>;
}
