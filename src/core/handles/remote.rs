// ─── Remote Handle ───
// Uniform view over an explicit url, a named API profile, or a
// (profile, route, domain) tuple, plus the http client to reach it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use tracing::{debug, info};

use super::ResourceHandle;
use crate::core::api::{join_url, ApiProfile, ApiRegistry, LOCAL_DOMAIN};
use crate::core::auth::{credentials_for, Credentials};
use crate::core::error::{AccessError, AccessResult};
use crate::core::http::{build_blocking_client, build_http_client};
use crate::core::paths::placeholders;

/// What a remote handle can be built from.
#[derive(Debug, Clone)]
pub enum RemoteInput {
    /// A full url; wins over any profile match.
    Url(String),
    Profile(String),
    ProfileInstance(ApiProfile),
    Route {
        profile: String,
        route: String,
        domain: Option<String>,
    },
}

/// Transport flavour, fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientKind {
    #[default]
    Blocking,
    Async,
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiData {
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ApiData {
    fn decode(content_type: &str, body: Vec<u8>) -> AccessResult<Self> {
        if content_type.contains("json") {
            Ok(ApiData::Json(serde_json::from_slice(&body)?))
        } else if content_type.contains("text") {
            Ok(ApiData::Text(String::from_utf8_lossy(&body).into_owned()))
        } else {
            Ok(ApiData::Bytes(body))
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ApiData::Json(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RemoteHandle {
    api: Option<ApiProfile>,
    domain: Option<String>,
    url: Option<String>,
    kind: ClientKind,
    netrc_path: PathBuf,
    blocking: OnceLock<reqwest::blocking::Client>,
    client: OnceLock<reqwest::Client>,
    closed: bool,
}

impl Clone for RemoteHandle {
    /// Clones share configuration only; clients are rebuilt on demand.
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            domain: self.domain.clone(),
            url: self.url.clone(),
            kind: self.kind,
            netrc_path: self.netrc_path.clone(),
            blocking: OnceLock::new(),
            client: OnceLock::new(),
            closed: self.closed,
        }
    }
}

impl RemoteHandle {
    pub fn new(input: RemoteInput, registry: &ApiRegistry, kind: ClientKind) -> AccessResult<Self> {
        let mut handle = Self {
            api: None,
            domain: None,
            url: None,
            kind,
            netrc_path: PathBuf::from("~/.netrc"),
            blocking: OnceLock::new(),
            client: OnceLock::new(),
            closed: false,
        };

        match input {
            RemoteInput::Url(url) if url.starts_with("http") => {
                let (api, domain) = registry.identify_api_from_url(&url)?;
                if let Some(name) = api {
                    let mut profile = registry.profile(&name)?;
                    if let Some(domain) = domain.as_deref() {
                        let port = match domain {
                            LOCAL_DOMAIN => Url::parse(&url).ok().and_then(|u| u.port()),
                            _ => None,
                        };
                        // a local url without an explicit port keeps the default host
                        if domain != LOCAL_DOMAIN || port.is_some() {
                            profile.change_domain(domain, port)?;
                        }
                    }
                    handle.api = Some(profile);
                }
                handle.domain = domain;
                handle.url = Some(url);
            }
            RemoteInput::Url(name) | RemoteInput::Profile(name) => {
                handle.api = Some(registry.profile(&name)?);
            }
            RemoteInput::ProfileInstance(profile) => {
                handle.api = Some(profile);
            }
            RemoteInput::Route {
                profile,
                route,
                domain,
            } => {
                let mut profile = registry.profile(&profile)?;
                if let Some(domain) = domain.as_deref() {
                    profile.change_domain(domain, None)?;
                }
                handle.url = Some(profile.construct_route(&route));
                handle.api = Some(profile);
            }
        }

        if handle.domain.is_none() {
            handle.domain = handle.api.as_ref().map(|a| a.current_domain_key().to_string());
        }
        debug!(
            "Remote handle: api={:?}, url={:?}",
            handle.api.as_ref().map(ApiProfile::name),
            handle.url
        );
        Ok(handle)
    }

    pub fn with_netrc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.netrc_path = path.into();
        self
    }

    pub fn api(&self) -> Option<&ApiProfile> {
        self.api.as_ref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    pub fn full_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Build the url from the profile's base and a route segment.
    pub fn load_url(&mut self, route: &str) -> AccessResult<&str> {
        let url = if route.starts_with("http") {
            route.to_string()
        } else {
            let api = self.api.as_ref().ok_or_else(|| {
                AccessError::Config(format!("no API profile set, cannot build a url for {route}"))
            })?;
            api.construct_route(route)
        };
        Ok(self.url.insert(url).as_str())
    }

    /// Append a route segment to the current url.
    pub fn extend_url(&mut self, route: &str) -> AccessResult<&str> {
        let current = self
            .url
            .as_deref()
            .ok_or_else(|| AccessError::Config("no url set to extend".into()))?;
        let url = join_url(current, route);
        Ok(self.url.insert(url).as_str())
    }

    /// `{name}` parameters still present in the url.
    pub fn extract_url_brackets(&self) -> Vec<String> {
        let Some(url) = self.url.as_deref() else {
            return Vec::new();
        };
        let mut names: Vec<String> = Vec::new();
        for (_, key) in placeholders(url) {
            if !names.iter().any(|n| n == key) {
                names.push(key.to_string());
            }
        }
        names
    }

    /// Fill url parameters from a mapping.
    ///
    /// Fails without touching the url when any parameter stays unmapped.
    pub fn resolve_url(&mut self, params: &BTreeMap<String, String>) -> AccessResult<&str> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| AccessError::Config("no url set to resolve".into()))?;

        let missing: Vec<String> = self
            .extract_url_brackets()
            .into_iter()
            .filter(|k| !params.contains_key(k))
            .collect();
        if !missing.is_empty() {
            return Err(AccessError::UnresolvedParameter {
                url: url.to_string(),
                missing,
            });
        }

        let mut resolved = String::with_capacity(url.len());
        let mut last = 0;
        for (range, key) in placeholders(url) {
            resolved.push_str(&url[last..range.start]);
            resolved.push_str(params.get(key).map_or("", String::as_str));
            last = range.end;
        }
        resolved.push_str(&url[last..]);
        Ok(self.url.insert(resolved).as_str())
    }

    pub fn has_valid_url(&self) -> bool {
        self.url.is_some() && self.extract_url_brackets().is_empty()
    }

    /// Issue a request on the blocking client.
    pub fn request(&self, method: Method, data: Option<&serde_json::Value>) -> AccessResult<ApiData> {
        let url = self.request_url(ClientKind::Blocking)?;
        let client = self.blocking_client()?;

        let mut req = client.request(method.clone(), url);
        req = match (method == Method::GET, data) {
            (true, Some(data)) => req.query(data),
            (false, Some(data)) => req.json(data),
            (_, None) => req,
        };
        req = match self.credentials(url)? {
            Credentials::Anonymous => req,
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::Basic { login, password } => req.basic_auth(login, Some(password)),
        };

        info!("{method} {url}");
        let resp = req.send()?;
        check_status(url, resp.status())?;
        let content_type = header_str(resp.headers());
        let body = resp.bytes()?.to_vec();
        ApiData::decode(&content_type, body)
    }

    /// Issue a request on the async client.
    pub async fn request_async(
        &self,
        method: Method,
        data: Option<&serde_json::Value>,
    ) -> AccessResult<ApiData> {
        let url = self.request_url(ClientKind::Async)?;
        let client = self.async_client()?;

        let mut req = client.request(method.clone(), url);
        req = match (method == Method::GET, data) {
            (true, Some(data)) => req.query(data),
            (false, Some(data)) => req.json(data),
            (_, None) => req,
        };
        req = match self.credentials(url)? {
            Credentials::Anonymous => req,
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::Basic { login, password } => req.basic_auth(login, Some(password)),
        };

        info!("{method} {url}");
        let resp = req.send().await?;
        check_status(url, resp.status())?;
        let content_type = header_str(resp.headers());
        let body = resp.bytes().await?.to_vec();
        ApiData::decode(&content_type, body)
    }

    fn request_url(&self, kind: ClientKind) -> AccessResult<&str> {
        if self.closed {
            return Err(AccessError::Config("remote handle is closed".into()));
        }
        if self.kind != kind {
            return Err(AccessError::Config(format!(
                "remote handle was built for a {:?} client",
                self.kind
            )));
        }
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| AccessError::Config("no url set, cannot make a request".into()))?;
        if !self.has_valid_url() {
            return Err(AccessError::UnresolvedParameter {
                url: url.to_string(),
                missing: self.extract_url_brackets(),
            });
        }
        Ok(url)
    }

    fn credentials(&self, url: &str) -> AccessResult<Credentials> {
        let Some(api) = &self.api else {
            return Ok(Credentials::Anonymous);
        };
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        credentials_for(api.auth_type(), api.name(), &host, &self.netrc_path)
    }

    fn blocking_client(&self) -> AccessResult<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }
        let client = build_blocking_client()?;
        Ok(self.blocking.get_or_init(|| client))
    }

    fn async_client(&self) -> AccessResult<&reqwest::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = build_http_client()?;
        Ok(self.client.get_or_init(|| client))
    }
}

fn check_status(url: &str, status: reqwest::StatusCode) -> AccessResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(AccessError::RequestFailed {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

fn header_str(headers: &reqwest::header::HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

impl ResourceHandle for RemoteHandle {
    fn is_connected(&self) -> bool {
        !self.closed && (self.api.is_some() || self.url.is_some())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.blocking.take();
        self.client.take();
        debug!("Closed remote handle");
    }
}
