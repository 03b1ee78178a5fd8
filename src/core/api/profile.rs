use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::auth::{token_from_env, AuthType};
use crate::core::error::{AccessError, AccessResult};

/// Key of the local development domain every profile accepts.
pub const LOCAL_DOMAIN: &str = "local";

/// A host the archive services are reachable on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub description: String,
}

impl Domain {
    pub fn validate(&self) -> AccessResult<()> {
        let ok = self.name == "localhost"
            || self.name.ends_with("sdss.org")
            || self.name.ends_with("sdss.utah.edu");
        if ok {
            Ok(())
        } else {
            Err(AccessError::Config(format!(
                "domain name {} does not fit \"xxx.sdss.org\" or \"xxx.sdss.utah.edu\"",
                self.name
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Affix {
    #[default]
    Prefix,
    Suffix,
}

/// Path stems for the development and public variants of an API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stems {
    #[serde(default = "default_test_stem")]
    pub test: String,
    #[serde(default = "default_public_stem")]
    pub public: String,
    #[serde(default)]
    pub affix: Affix,
}

fn default_test_stem() -> String {
    "test".into()
}

fn default_public_stem() -> String {
    "public".into()
}

impl Default for Stems {
    fn default() -> Self {
        Self {
            test: default_test_stem(),
            public: default_public_stem(),
            affix: Affix::Prefix,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthInfo {
    #[serde(rename = "type", default)]
    pub kind: AuthType,
    #[serde(default)]
    pub route: Option<String>,
}

/// Registry entry of one API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileInfo {
    pub base: String,
    pub domains: Vec<String>,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub stems: Stems,
    #[serde(default)]
    pub api: bool,
    #[serde(default)]
    pub auth: AuthInfo,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub docs: Option<String>,
}

/// One API with its currently selected domain and base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiProfile {
    name: String,
    info: ProfileInfo,
    domains: BTreeMap<String, Domain>,
    current_domain: String,
    host: String,
    test: bool,
    public: bool,
    url: String,
}

impl ApiProfile {
    /// Build a profile against the registered domains, selecting its first
    /// domain.
    pub fn new(
        name: impl Into<String>,
        info: ProfileInfo,
        registered: &BTreeMap<String, Domain>,
    ) -> AccessResult<Self> {
        let name = name.into();
        if info.domains.is_empty() {
            return Err(AccessError::Config(format!(
                "API profile {name} has no domains set"
            )));
        }

        let mut domains = BTreeMap::new();
        let wanted = info
            .domains
            .iter()
            .chain(info.mirrors.iter())
            .map(String::as_str)
            .chain(std::iter::once(LOCAL_DOMAIN));
        for key in wanted {
            let domain = registered.get(key).ok_or_else(|| {
                AccessError::Config(format!(
                    "API profile {name} references unregistered domain \"{key}\""
                ))
            })?;
            domains.insert(key.to_string(), domain.clone());
        }

        let first = info.domains[0].clone();
        let host = domains[&first].name.clone();
        let mut profile = Self {
            name,
            info,
            domains,
            current_domain: first,
            host,
            test: false,
            public: false,
            url: String::new(),
        };
        profile.url = profile.construct_url(false, false);
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ProfileInfo {
        &self.info
    }

    pub fn base(&self) -> &str {
        &self.info.base
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn docs(&self) -> Option<&str> {
        self.info.docs.as_deref()
    }

    /// Current base url.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn current_domain(&self) -> &Domain {
        &self.domains[&self.current_domain]
    }

    pub fn current_domain_key(&self) -> &str {
        &self.current_domain
    }

    pub fn valid_domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn is_local(&self) -> bool {
        self.current_domain == LOCAL_DOMAIN
    }

    pub fn is_domain_public(&self) -> bool {
        self.current_domain().public
    }

    /// Auth needed on the current domain; public and local hosts need none.
    pub fn auth_type(&self) -> AuthType {
        if self.is_domain_public() || self.is_local() {
            AuthType::None
        } else {
            self.info.auth.kind
        }
    }

    pub fn token(&self) -> Option<String> {
        token_from_env(&self.name)
    }

    /// Base url for the current domain, optionally on a development stem.
    pub fn construct_url(&self, test: bool, public: bool) -> String {
        let scheme = if self.is_local() { "http" } else { "https" };
        format!("{scheme}://{}/{}", self.host, self.base_stem(test, public))
    }

    /// Full url of a route under the current base.
    pub fn construct_route(&self, route: &str) -> String {
        join_url(&self.url, route)
    }

    /// Url to request a token from, for token-authenticated APIs.
    pub fn construct_token_url(&self) -> AccessResult<Option<String>> {
        if self.info.auth.kind != AuthType::Token {
            return Ok(None);
        }
        let route = self.info.auth.route.as_deref().ok_or_else(|| {
            AccessError::Config(format!("no token route set for API profile {}", self.name))
        })?;
        Ok(Some(self.construct_route(route)))
    }

    /// Switch host. The `local` domain needs a port; no other domain takes one.
    pub fn change_domain(&mut self, domain: &str, port: Option<u16>) -> AccessResult<()> {
        let entry = self.domains.get(domain).ok_or_else(|| {
            AccessError::Config(format!(
                "domain \"{domain}\" is not valid for API profile {}",
                self.name
            ))
        })?;

        self.host = match (domain == LOCAL_DOMAIN, port) {
            (true, Some(port)) => format!("{}:{port}", entry.name),
            (true, None) => {
                return Err(AccessError::Config(
                    "a port must be specified when the domain is local".into(),
                ))
            }
            (false, Some(_)) => {
                return Err(AccessError::Config(
                    "domain must be local if a port is set".into(),
                ))
            }
            (false, None) => entry.name.clone(),
        };
        self.current_domain = domain.to_string();
        self.url = self.construct_url(self.test, self.public);
        Ok(())
    }

    /// Switch between the production and development paths.
    pub fn change_path(&mut self, test: bool, public: bool) {
        self.test = test;
        self.public = public;
        self.url = self.construct_url(test, public);
    }

    fn base_stem(&self, test: bool, public: bool) -> String {
        let stems = &self.info.stems;
        let mut path = self.info.base.trim_matches('/').to_string();
        for (on, stem) in [(test, &stems.test), (public, &stems.public)] {
            if on {
                path = match stems.affix {
                    Affix::Prefix => format!("{stem}/{path}"),
                    Affix::Suffix => format!("{path}/{stem}"),
                };
            }
        }
        if self.info.api {
            path.push_str("/api");
        }
        path
    }
}

impl std::fmt::Display for ApiProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name.to_ascii_lowercase())
    }
}

/// Join a route onto a base url; a route already under the base is kept.
pub(crate) fn join_url(base: &str, route: &str) -> String {
    if route.is_empty() {
        return base.to_string();
    }
    if route.starts_with(base) {
        return route.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), route.trim_start_matches('/'))
}
