use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::{AccessError, AccessResult};
use crate::core::parsing::ParsedInput;

/// A resolved data identifier: exactly one of a filename or an object id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Filename(PathBuf),
    ObjectId(String),
}

impl Identifier {
    /// Build the identifier from parser output.
    ///
    /// A filename always wins over an object id; an output with neither is
    /// rejected.
    pub fn from_parsed(parsed: &ParsedInput) -> AccessResult<Self> {
        if let Some(filename) = &parsed.filename {
            return Ok(Identifier::Filename(filename.clone()));
        }
        match &parsed.objectid {
            Some(id) if !id.is_empty() => Ok(Identifier::ObjectId(id.clone())),
            _ => Err(AccessError::Parsing(
                "no inputs defined: filename and objectid are both empty".into(),
            )),
        }
    }

    pub fn is_filename(&self) -> bool {
        matches!(self, Identifier::Filename(_))
    }

    pub fn filename(&self) -> Option<&Path> {
        match self {
            Identifier::Filename(p) => Some(p),
            Identifier::ObjectId(_) => None,
        }
    }

    pub fn objectid(&self) -> Option<&str> {
        match self {
            Identifier::ObjectId(id) => Some(id),
            Identifier::Filename(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Filename(p) => write!(f, "filename='{}'", p.display()),
            Identifier::ObjectId(id) => write!(f, "objectid='{id}'"),
        }
    }
}
