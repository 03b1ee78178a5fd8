mod netrc;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use netrc::{Netrc, NetrcEntry};

use crate::core::error::{AccessError, AccessResult};

/// How a remote API expects to be authenticated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    Netrc,
    Token,
    None,
}

/// Credentials attached to an outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Bearer(String),
    Basic { login: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Bearer(_) => write!(f, "Bearer(***)"),
            Credentials::Basic { login, .. } => write!(f, "Basic({login}, ***)"),
        }
    }
}

/// Name of the environment variable holding a profile's token (`VALIS_API_TOKEN`).
pub fn token_env_var(profile: &str) -> String {
    format!("{}_API_TOKEN", profile.to_ascii_uppercase())
}

pub fn token_from_env(profile: &str) -> Option<String> {
    std::env::var(token_env_var(profile))
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Credentials for a request to `host` on behalf of `profile`.
pub fn credentials_for(
    auth: AuthType,
    profile: &str,
    host: &str,
    netrc_path: &Path,
) -> AccessResult<Credentials> {
    match auth {
        AuthType::None => Ok(Credentials::Anonymous),
        AuthType::Token => token_from_env(profile).map(Credentials::Bearer).ok_or_else(|| {
            AccessError::Auth(format!(
                "API profile {profile} needs a token; set {}",
                token_env_var(profile)
            ))
        }),
        AuthType::Netrc => {
            let entry = Netrc::load(netrc_path)?.entry(host)?;
            Ok(Credentials::Basic {
                login: entry.login,
                password: entry.password,
            })
        }
    }
}
