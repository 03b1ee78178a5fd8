// ─── Access Path Templates ───
// Named path templates with `{key}` placeholders, rooted either under the
// local archive mirror or the archive url.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::spec::PathSpec;
use crate::core::error::{AccessError, AccessResult};
use crate::core::version::{canonical_release, is_public_release, is_work_release};

const BUNDLED_TEMPLATES: &str = include_str!("../../../resources/path_templates.json");

/// `{key}` placeholders of a template: (byte range incl. braces, key).
pub(crate) fn placeholders(template: &str) -> Vec<(Range<usize>, &str)> {
    let mut found = Vec::new();
    let mut rest = 0;
    while let Some(open) = template[rest..].find('{').map(|i| rest + i) {
        let Some(close) = template[open..].find('}').map(|i| open + i) else {
            break;
        };
        let key = &template[open + 1..close];
        if !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            found.push((open..close + 1, key));
        }
        rest = close + 1;
    }
    found
}

/// Directory a release lives under (`DR17` → `dr17`, `WORK` → `sdsswork`).
pub fn release_dir(release: &str) -> String {
    if is_work_release(release) {
        "sdsswork".to_string()
    } else if is_public_release(release) {
        canonical_release(release).to_ascii_lowercase()
    } else {
        release.trim().to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TemplateFile {
    /// `$NAME` → default location relative to the release root.
    #[serde(default)]
    env: BTreeMap<String, String>,
    templates: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PathTemplates {
    env: BTreeMap<String, String>,
    templates: BTreeMap<String, String>,
    base_dir: PathBuf,
    base_url: String,
}

impl PathTemplates {
    pub fn from_json(raw: &str, base_dir: PathBuf, base_url: &str) -> AccessResult<Self> {
        let file: TemplateFile = serde_json::from_str(raw)?;
        Ok(Self {
            env: file.env,
            templates: file.templates,
            base_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn bundled(base_dir: PathBuf, base_url: &str) -> AccessResult<Self> {
        Self::from_json(BUNDLED_TEMPLATES, base_dir, base_url)
    }

    pub fn load(path: &Path, base_dir: PathBuf, base_url: &str) -> AccessResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| AccessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, base_dir, base_url)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn template(&self, name: &str) -> AccessResult<&str> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AccessError::PathConfiguration(format!("unknown path template \"{name}\"")))
    }

    /// Placeholder names of a template, in first-appearance order.
    pub fn lookup_keys(&self, name: &str) -> AccessResult<Vec<String>> {
        let template = self.template(name)?;
        let mut keys: Vec<String> = Vec::new();
        for (_, key) in placeholders(template) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    /// Local path of a filled template.
    ///
    /// A `$NAME` prefix resolves to the `NAME` environment variable when it
    /// is set, else to its registered location under the release root.
    pub fn full(&self, spec: &PathSpec, release: &str) -> AccessResult<PathBuf> {
        let (env_root, relative) = self.fill(spec)?;
        let release_root = self.base_dir.join(release_dir(release));

        let path = match env_root {
            Some((var, default)) => match std::env::var_os(&var) {
                Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(&relative),
                _ => release_root.join(default).join(&relative),
            },
            None => release_root.join(&relative),
        };
        debug!("Materialized local path {:?}", path);
        Ok(path)
    }

    /// Remote url of a filled template.
    pub fn url(&self, spec: &PathSpec, release: &str) -> AccessResult<String> {
        let (env_root, relative) = self.fill(spec)?;
        let mut url = format!("{}/{}", self.base_url, release_dir(release));
        if let Some((_, default)) = env_root {
            url.push('/');
            url.push_str(default.trim_matches('/'));
        }
        url.push('/');
        url.push_str(&relative);
        Ok(url)
    }

    /// Recover template parameters from a concrete path.
    ///
    /// Returns `None` when the path does not fit the template.
    pub fn extract(&self, name: &str, path: &Path) -> AccessResult<Option<BTreeMap<String, String>>> {
        let template = self.template(name)?;
        let (_, relative) = split_env(template);

        let mut pattern = String::from("(?:^|/)");
        let mut order: Vec<String> = Vec::new();
        let mut last = 0;
        for (range, key) in placeholders(relative) {
            pattern.push_str(&regex::escape(&relative[last..range.start]));
            pattern.push_str("([^/]+?)");
            order.push(key.to_string());
            last = range.end;
        }
        pattern.push_str(&regex::escape(&relative[last..]));
        pattern.push('$');

        let re = Regex::new(&pattern)
            .map_err(|e| AccessError::PathConfiguration(format!("template \"{name}\": {e}")))?;
        let text = path.to_string_lossy();
        let Some(caps) = re.captures(&text) else {
            return Ok(None);
        };

        let mut params = BTreeMap::new();
        for (i, key) in order.iter().enumerate() {
            let value = caps.get(i + 1).map_or("", |m| m.as_str());
            match params.get(key) {
                Some(prev) if prev != value => return Ok(None),
                Some(_) => {}
                None => {
                    params.insert(key.clone(), value.to_string());
                }
            }
        }
        Ok(Some(params))
    }

    /// Fill the placeholders of the spec's template.
    ///
    /// Returns the `$NAME` root (with its registered default) and the filled
    /// remainder.
    fn fill(&self, spec: &PathSpec) -> AccessResult<(Option<(String, String)>, String)> {
        let name = spec
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AccessError::PathConfiguration("no path template name is set".into()))?;
        let template = self.template(name)?;
        let (env, relative) = split_env(template);

        let keys = self.lookup_keys(name)?;
        let missing: Vec<&str> = keys
            .iter()
            .filter(|k| spec.get(k).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AccessError::PathConfiguration(format!(
                "path template \"{name}\" is missing parameters: {}",
                missing.join(", ")
            )));
        }

        let mut filled = String::with_capacity(relative.len());
        let mut last = 0;
        for (range, key) in placeholders(relative) {
            filled.push_str(&relative[last..range.start]);
            filled.push_str(spec.get(key).unwrap_or_default());
            last = range.end;
        }
        filled.push_str(&relative[last..]);

        let env_root = match env {
            Some(var) => {
                let default = self.env.get(var).ok_or_else(|| {
                    AccessError::PathConfiguration(format!(
                        "path template \"{name}\" uses unregistered root ${var}"
                    ))
                })?;
                Some((var.to_string(), default.clone()))
            }
            None => None,
        };
        Ok((env_root, filled))
    }
}

/// Split `$NAME/rest` into (`NAME`, `rest`).
fn split_env(template: &str) -> (Option<&str>, &str) {
    match template.strip_prefix('$') {
        Some(rest) => match rest.split_once('/') {
            Some((var, tail)) => (Some(var), tail),
            None => (Some(rest), ""),
        },
        None => (None, template.trim_start_matches('/')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn templates() -> PathTemplates {
        PathTemplates::bundled(PathBuf::from("/sas"), "https://data.sdss.org/sas/").unwrap()
    }

    fn cube() -> PathSpec {
        PathSpec::new("mangacube")
            .with_param("drpver", "v2_4_3")
            .with_param("plate", "8485")
            .with_param("ifu", "1901")
            .with_param("wave", "LOG")
    }

    #[test]
    fn lookup_keys_are_unique_and_ordered() {
        let keys = templates().lookup_keys("mangacube").unwrap();
        assert_eq!(keys, vec!["drpver", "plate", "ifu", "wave"]);
    }

    #[test]
    #[serial]
    fn full_path_uses_release_root() {
        std::env::remove_var("MANGA_SPECTRO_REDUX");
        let path = templates().full(&cube(), "DR15").unwrap();
        assert_eq!(
            path,
            PathBuf::from(
                "/sas/dr15/manga/spectro/redux/v2_4_3/8485/stack/manga-8485-1901-LOGCUBE.fits.gz"
            )
        );
    }

    #[test]
    #[serial]
    fn env_root_overrides_release_root() {
        std::env::set_var("MANGA_SPECTRO_REDUX", "/data/redux");
        let path = templates().full(&cube(), "DR15").unwrap();
        std::env::remove_var("MANGA_SPECTRO_REDUX");
        assert!(path.starts_with("/data/redux/v2_4_3"));
    }

    #[test]
    fn url_uses_archive_base() {
        let url = templates().url(&cube(), "WORK").unwrap();
        assert_eq!(
            url,
            "https://data.sdss.org/sas/sdsswork/manga/spectro/redux/v2_4_3/8485/stack/manga-8485-1901-LOGCUBE.fits.gz"
        );
    }

    #[test]
    fn missing_parameters_are_a_configuration_error() {
        let mut spec = cube();
        spec.set("ifu", None);
        let err = templates().full(&spec, "DR15").unwrap_err();
        assert!(matches!(err, AccessError::PathConfiguration(m) if m.contains("ifu")));

        let err = templates().url(&PathSpec::default(), "DR15").unwrap_err();
        assert!(matches!(err, AccessError::PathConfiguration(_)));

        let err = templates().lookup_keys("nope").unwrap_err();
        assert!(matches!(err, AccessError::PathConfiguration(_)));
    }

    #[test]
    fn extract_reverses_a_template() {
        let path = Path::new(
            "/sas/dr17/manga/spectro/redux/v3_1_1/8485/stack/manga-8485-1901-LOGCUBE.fits.gz",
        );
        let params = templates().extract("mangacube", path).unwrap().unwrap();
        assert_eq!(params["drpver"], "v3_1_1");
        assert_eq!(params["plate"], "8485");
        assert_eq!(params["ifu"], "1901");
        assert_eq!(params["wave"], "LOG");
    }

    #[test]
    fn extract_rejects_inconsistent_paths() {
        let t = templates();
        let mismatched = Path::new("/x/v3_1_1/8485/stack/manga-7443-1901-LOGCUBE.fits.gz");
        assert_eq!(t.extract("mangacube", mismatched).unwrap(), None);
        assert_eq!(t.extract("mangacube", Path::new("/tmp/other.fits")).unwrap(), None);
    }

    #[test]
    fn release_dirs() {
        assert_eq!(release_dir("dr16"), "dr16");
        assert_eq!(release_dir("WORK"), "sdsswork");
        assert_eq!(release_dir("MPL-11"), "mpl-11");
    }
}
