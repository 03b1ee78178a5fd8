use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::AccessError;

/// Operating mode of a lookup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Try local access first, fall back to the api on local failure.
    #[default]
    Auto,
    /// Hard commitment to local access (database or file).
    Local,
    /// Hard commitment to remote access.
    Remote,
}

/// Where the data of a lookup ended up coming from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    File,
    Db,
    Api,
}

impl DataOrigin {
    pub fn is_local(self) -> bool {
        !matches!(self, DataOrigin::Api)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => write!(f, "auto"),
            Mode::Local => write!(f, "local"),
            Mode::Remote => write!(f, "remote"),
        }
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::File => write!(f, "file"),
            DataOrigin::Db => write!(f, "db"),
            DataOrigin::Api => write!(f, "api"),
        }
    }
}

impl FromStr for Mode {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "local" => Ok(Mode::Local),
            "remote" => Ok(Mode::Remote),
            other => Err(AccessError::Config(format!(
                "mode must be \"auto\", \"local\" or \"remote\", got \"{other}\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("REMOTE".parse::<Mode>().unwrap(), Mode::Remote);
        assert_eq!(" local ".parse::<Mode>().unwrap(), Mode::Local);
        assert!("online".parse::<Mode>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&DataOrigin::Db).unwrap();
        assert_eq!(json, "\"db\"");
        let mode: Mode = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(mode, Mode::Auto);
    }
}
