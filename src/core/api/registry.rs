// ─── API Registry ───
// Registered domains and API profiles, plus the currently selected profile.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use super::profile::{ApiProfile, Domain, ProfileInfo};
use crate::core::error::{AccessError, AccessResult};

const BUNDLED_PROFILES: &str = include_str!("../../../resources/api_profiles.json");

#[derive(Debug, Deserialize)]
struct RegistryFile {
    domains: BTreeMap<String, Domain>,
    apis: BTreeMap<String, ProfileInfo>,
}

#[derive(Debug, Clone)]
pub struct ApiRegistry {
    domains: BTreeMap<String, Domain>,
    apis: BTreeMap<String, ApiProfile>,
    current: Option<String>,
}

impl ApiRegistry {
    pub fn from_json(raw: &str) -> AccessResult<Self> {
        let file: RegistryFile = serde_json::from_str(raw)?;
        for domain in file.domains.values() {
            domain.validate()?;
        }
        let apis = file
            .apis
            .into_iter()
            .map(|(name, info)| {
                let profile = ApiProfile::new(name.clone(), info, &file.domains)?;
                Ok((name, profile))
            })
            .collect::<AccessResult<BTreeMap<_, _>>>()?;

        Ok(Self {
            domains: file.domains,
            apis,
            current: None,
        })
    }

    pub fn bundled() -> AccessResult<Self> {
        Self::from_json(BUNDLED_PROFILES)
    }

    pub fn load(path: &Path) -> AccessResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| AccessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&raw)?;
        info!(
            "Loaded {} API profiles and {} domains from {:?}",
            registry.apis.len(),
            registry.domains.len(),
            path
        );
        Ok(registry)
    }

    pub fn list_apis(&self) -> impl Iterator<Item = &ApiProfile> {
        self.apis.values()
    }

    pub fn list_domains(&self) -> impl Iterator<Item = (&str, &Domain)> {
        self.domains.iter().map(|(k, d)| (k.as_str(), d))
    }

    /// A fresh copy of a named profile.
    pub fn profile(&self, name: &str) -> AccessResult<ApiProfile> {
        self.apis
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::ProfileNotFound(name.to_string()))
    }

    pub fn current(&self) -> Option<&ApiProfile> {
        self.current.as_deref().and_then(|n| self.apis.get(n))
    }

    /// Select the profile used by default for remote access.
    pub fn set_profile(&mut self, name: &str, domain: Option<&str>, test: bool) -> AccessResult<()> {
        let profile = self
            .apis
            .get_mut(name)
            .ok_or_else(|| AccessError::ProfileNotFound(name.to_string()))?;
        if let Some(domain) = domain {
            profile.change_domain(domain, None)?;
        }
        if test {
            profile.change_path(true, false);
        }
        self.current = Some(name.to_string());
        debug!("Current API profile set to {name}");
        Ok(())
    }

    /// Best-effort match of a url against registered profiles and domains.
    ///
    /// Yields `(None, None)` for an unrelated url; only a non-http url is an
    /// error.
    pub fn identify_api_from_url(&self, url: &str) -> AccessResult<(Option<String>, Option<String>)> {
        if !url.starts_with("http") {
            return Err(AccessError::Config(format!(
                "url {url} does not start with http"
            )));
        }
        let parsed = Url::parse(url)
            .map_err(|e| AccessError::Config(format!("invalid url {url}: {e}")))?;

        let path = parsed.path().trim_matches('/');
        let api = self
            .apis
            .values()
            .filter(|p| {
                let base = p.base().trim_matches('/');
                path == base
                    || path.starts_with(&format!("{base}/"))
                    || path.contains(&format!("/{base}/"))
                    || path.ends_with(&format!("/{base}"))
            })
            .max_by_key(|p| p.base().len())
            .map(|p| p.name().to_string());

        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_string(),
            (None, _) => String::new(),
        };
        let bare_host = parsed.host_str().unwrap_or_default();
        let domain = self
            .domains
            .iter()
            .find(|(_, d)| d.name == host || d.name == bare_host)
            .map(|(k, _)| k.clone());

        Ok((api, domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_registry_loads() {
        let reg = ApiRegistry::bundled().unwrap();
        let names: Vec<_> = reg.list_apis().map(|p| p.name().to_string()).collect();
        assert!(names.contains(&"marvin".to_string()));
        assert!(reg.list_domains().any(|(k, _)| k == "local"));
    }

    #[test]
    fn unknown_profile_is_reported() {
        let reg = ApiRegistry::bundled().unwrap();
        assert!(matches!(
            reg.profile("nosuchapi"),
            Err(AccessError::ProfileNotFound(n)) if n == "nosuchapi"
        ));
    }

    #[test]
    fn identifies_profile_and_domain() {
        let reg = ApiRegistry::bundled().unwrap();
        let (api, domain) = reg
            .identify_api_from_url("https://dr15.sdss.org/marvin/api/cubes/8485-1901/")
            .unwrap();
        assert_eq!(api.as_deref(), Some("marvin"));
        assert_eq!(domain.as_deref(), Some("dr15"));

        let (api, domain) = reg
            .identify_api_from_url("http://localhost:5000/valis/info")
            .unwrap();
        assert_eq!(api.as_deref(), Some("valis"));
        assert_eq!(domain.as_deref(), Some("local"));
    }

    #[test]
    fn unrelated_url_is_not_an_error() {
        let reg = ApiRegistry::bundled().unwrap();
        let found = reg.identify_api_from_url("https://example.com/other").unwrap();
        assert_eq!(found, (None, None));
        assert!(reg.identify_api_from_url("ftp://sas.sdss.org/x").is_err());
    }

    #[test]
    fn set_profile_switches_current() {
        let mut reg = ApiRegistry::bundled().unwrap();
        assert!(reg.current().is_none());
        reg.set_profile("marvin", Some("dr16"), true).unwrap();
        let current = reg.current().unwrap();
        assert_eq!(current.url(), "https://dr16.sdss.org/test/marvin/api");
        assert!(reg.set_profile("nope", None, false).is_err());
    }

    #[test]
    fn unknown_domains_in_profiles_are_rejected() {
        let raw = r#"{
            "domains": {"local": {"name": "localhost"}},
            "apis": {"toy": {"base": "toy", "domains": ["sas"]}}
        }"#;
        assert!(matches!(
            ApiRegistry::from_json(raw),
            Err(AccessError::Config(_))
        ));
    }
}
