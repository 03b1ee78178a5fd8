use std::io::Write;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::auth::Credentials;
use crate::core::error::{AccessError, AccessResult};
use crate::core::http::{build_blocking_client, build_http_client};

/// A single file to fetch from the archive into the local mirror.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub credentials: Credentials,
}

impl DownloadEntry {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            credentials: Credentials::Anonymous,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sibling path the body is streamed into before the final rename.
    fn part_path(&self) -> PathBuf {
        let mut name = self
            .dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.dest.with_file_name(name)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> AccessError + '_ {
    move |source| AccessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(dest: &Path) -> AccessResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    Ok(())
}

/// Download a file on the blocking client. Returns the number of bytes written.
///
/// The body lands in `<dest>.part` and is renamed into place once complete,
/// so an interrupted transfer never leaves a truncated `dest` behind.
pub fn download_file(entry: &DownloadEntry) -> AccessResult<u64> {
    ensure_parent(&entry.dest)?;
    let client = build_blocking_client()?;

    let req = client.get(&entry.url);
    let req = match &entry.credentials {
        Credentials::Anonymous => req,
        Credentials::Bearer(token) => req.bearer_auth(token),
        Credentials::Basic { login, password } => req.basic_auth(login, Some(password)),
    };

    info!("Downloading {} -> {:?}", entry.url, entry.dest);
    let mut response = req.send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(AccessError::DownloadFailed {
            url: entry.url.clone(),
            status: status.as_u16(),
        });
    }

    let part = entry.part_path();
    let written = match write_part(&part, &entry.dest, &mut response) {
        Ok(written) => written,
        Err(e) => {
            discard(&part);
            return Err(e);
        }
    };

    debug!("Downloaded {written} bytes: {}", entry.url);
    Ok(written)
}

/// Download a file on the async client, streaming the body to disk.
pub async fn download_file_async(entry: &DownloadEntry) -> AccessResult<u64> {
    if let Some(parent) = entry.dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }
    let client = build_http_client()?;

    let req = client.get(&entry.url);
    let req = match &entry.credentials {
        Credentials::Anonymous => req,
        Credentials::Bearer(token) => req.bearer_auth(token),
        Credentials::Basic { login, password } => req.basic_auth(login, Some(password)),
    };

    info!("Downloading {} -> {:?}", entry.url, entry.dest);
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AccessError::DownloadFailed {
            url: entry.url.clone(),
            status: status.as_u16(),
        });
    }

    let part = entry.part_path();
    let written = match write_part_async(&part, &entry.dest, response).await {
        Ok(written) => written,
        Err(e) => {
            discard(&part);
            return Err(e);
        }
    };

    debug!("Downloaded {written} bytes: {}", entry.url);
    Ok(written)
}

fn write_part(
    part: &Path,
    dest: &Path,
    response: &mut reqwest::blocking::Response,
) -> AccessResult<u64> {
    let mut file = std::fs::File::create(part).map_err(io_err(part))?;
    let written = response.copy_to(&mut file)?;
    file.flush().map_err(io_err(part))?;
    drop(file);
    std::fs::rename(part, dest).map_err(io_err(dest))?;
    Ok(written)
}

async fn write_part_async(
    part: &Path,
    dest: &Path,
    response: reqwest::Response,
) -> AccessResult<u64> {
    let mut file = tokio::fs::File::create(part).await.map_err(io_err(part))?;
    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_err(part))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err(part))?;
    drop(file);
    tokio::fs::rename(part, dest).await.map_err(io_err(dest))?;
    Ok(written)
}

/// Remove a partial transfer.
fn discard(part: &Path) {
    match std::fs::remove_file(part) {
        Ok(()) => debug!("Removed partial download {:?}", part),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial download {:?}: {e}", part),
    }
}
