use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::error::{AccessError, AccessResult};

/// Credentials of one `machine` entry.
#[derive(Clone, PartialEq, Eq)]
pub struct NetrcEntry {
    pub machine: String,
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for NetrcEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetrcEntry")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// A parsed `.netrc` file.
#[derive(Debug, Clone)]
pub struct Netrc {
    path: PathBuf,
    entries: Vec<NetrcEntry>,
}

impl Netrc {
    /// Read and parse a netrc file. `~` is expanded to the home directory.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let path = expand_home(path);
        if !path.is_file() {
            return Err(AccessError::Auth(format!("no .netrc file found at {path:?}")));
        }
        check_permissions(&path)?;

        let raw = std::fs::read_to_string(&path).map_err(|source| AccessError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            entries: parse(&raw),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.machine.as_str())
    }

    pub fn entry(&self, host: &str) -> AccessResult<NetrcEntry> {
        self.entries
            .iter()
            .find(|e| e.machine == host)
            .cloned()
            .ok_or_else(|| {
                AccessError::Auth(format!("{host} must be a valid machine in {:?}", self.path))
            })
    }
}

pub(crate) fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> AccessResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let meta = std::fs::metadata(path).map_err(|source| AccessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.permissions().mode() & 0o077 != 0 {
        return Err(AccessError::Auth(format!(
            "{path:?} must have 600 permissions; run chmod 600 on it"
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> AccessResult<()> {
    Ok(())
}

/// Token-stream parse of `machine`/`login`/`password` triples.
fn parse(raw: &str) -> Vec<NetrcEntry> {
    let mut entries = Vec::new();
    let mut current: Option<NetrcEntry> = None;
    let mut tokens = raw
        .lines()
        .map(|l| l.split('#').next().unwrap_or_default())
        .flat_map(str::split_whitespace);

    while let Some(token) = tokens.next() {
        match token {
            "machine" | "default" => {
                if let Some(entry) = current.take() {
                    entries.push(entry);
                }
                let machine = if token == "default" {
                    "default".to_string()
                } else {
                    tokens.next().unwrap_or_default().to_string()
                };
                current = Some(NetrcEntry {
                    machine,
                    login: String::new(),
                    password: String::new(),
                });
            }
            "login" => {
                if let (Some(entry), Some(v)) = (current.as_mut(), tokens.next()) {
                    entry.login = v.to_string();
                }
            }
            "password" => {
                if let (Some(entry), Some(v)) = (current.as_mut(), tokens.next()) {
                    entry.password = v.to_string();
                }
            }
            "account" | "macdef" => {
                tokens.next();
            }
            other => warn!("Ignoring unexpected netrc token {other:?}"),
        }
    }
    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}
