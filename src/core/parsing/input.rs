use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::pattern::{PatternOptions, PATH_LEADERS};
use crate::core::error::{AccessError, AccessResult};

/// Patterns that produced a parse, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParserInputs {
    pub pattern: String,
    pub input_regex: Option<String>,
    pub object_pattern: String,
}

/// Output of classifying and matching a raw input string.
///
/// Exactly one of `filename` / `objectid` is set. `fields` holds one entry
/// per named group of the active pattern (`None` when the group did not
/// participate or the object id did not match at all).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedInput {
    pub filename: Option<PathBuf>,
    pub objectid: Option<String>,
    pub fields: BTreeMap<String, Option<String>>,
    /// Ordered, de-duplicated match groups; the first is the whole object id.
    pub parsed_groups: Option<Vec<String>>,
    pub inputs: Option<ParserInputs>,
}

impl ParsedInput {
    pub fn from_filename(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_objectid(id: impl Into<String>) -> Self {
        Self {
            objectid: Some(id.into()),
            ..Self::default()
        }
    }

    /// Value of a named field, if it was extracted.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Some(value.into()));
        self
    }
}

/// A compiled object-id matcher.
#[derive(Debug, Clone)]
pub struct InputParser {
    options: PatternOptions,
    object_pattern: String,
    regex: Regex,
    field_names: Vec<String>,
}

impl InputParser {
    pub fn new(options: PatternOptions) -> AccessResult<Self> {
        let object_pattern = options.object_pattern()?;
        let full = format!("^(?:{object_pattern})$");
        let regex = Regex::new(&full)
            .map_err(|e| AccessError::Parsing(format!("invalid pattern {full}: {e}")))?;

        let field_names = regex
            .capture_names()
            .flatten()
            .filter(|n| *n != "objectid")
            .map(str::to_string)
            .collect();

        Ok(Self {
            options,
            object_pattern,
            regex,
            field_names,
        })
    }

    /// Parser with the greedy whole-input default.
    pub fn greedy() -> AccessResult<Self> {
        Self::new(PatternOptions::default())
    }

    pub fn options(&self) -> &PatternOptions {
        &self.options
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn inputs(&self) -> ParserInputs {
        ParserInputs {
            pattern: self.regex.as_str().to_string(),
            input_regex: self.options.regex.clone(),
            object_pattern: self.object_pattern.clone(),
        }
    }

    /// Classify `value` as a filename or an object id and extract fields.
    pub fn parse(&self, value: &str) -> AccessResult<ParsedInput> {
        if value.trim().is_empty() {
            return Err(AccessError::Parsing("input value cannot be empty".into()));
        }

        let inputs = self.options.record_inputs.then(|| self.inputs());

        if looks_like_file(value) {
            debug!("Input '{}' classified as a filename", value);
            return Ok(ParsedInput {
                filename: Some(PathBuf::from(value)),
                inputs,
                ..ParsedInput::default()
            });
        }

        let mut parsed = ParsedInput {
            objectid: Some(value.to_string()),
            inputs,
            ..ParsedInput::default()
        };

        match self.regex.captures(value) {
            Some(caps) => {
                for name in &self.field_names {
                    let v = caps.name(name).map(|m| m.as_str().to_string());
                    parsed.fields.insert(name.clone(), v);
                }

                let mut groups: Vec<String> = Vec::new();
                for m in caps.iter().skip(1).flatten() {
                    let s = m.as_str();
                    if !s.is_empty() && !groups.iter().any(|g| g == s) {
                        groups.push(s.to_string());
                    }
                }
                parsed.parsed_groups = Some(groups);
            }
            None => {
                debug!("Object id '{}' matched no field pattern", value);
                for name in &self.field_names {
                    parsed.fields.insert(name.clone(), None);
                }
            }
        }

        Ok(parsed)
    }
}

/// Existing paths, and strings that start like a path, are filenames.
fn looks_like_file(value: &str) -> bool {
    value.starts_with(PATH_LEADERS) || Path::new(value).exists()
}

/// Compile `options` and parse `value` in one go.
pub fn parse_data_input(value: &str, options: &PatternOptions) -> AccessResult<ParsedInput> {
    InputParser::new(options.clone())?.parse(value)
}

/// Result of a bare regex match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMatch {
    Named(BTreeMap<String, Option<String>>),
    Groups(Vec<Option<String>>),
    Whole(String),
}

/// Match `value` against `regex` with no frills: named groups if the
/// pattern has any, otherwise the positional groups, otherwise the match.
pub fn raw_parse(value: &str, regex: &str) -> AccessResult<Option<RawMatch>> {
    let re = Regex::new(&format!("^(?:{regex})"))
        .map_err(|e| AccessError::Parsing(format!("invalid pattern {regex}: {e}")))?;

    let Some(caps) = re.captures(value) else {
        return Ok(None);
    };

    let named: BTreeMap<String, Option<String>> = re
        .capture_names()
        .flatten()
        .map(|n| (n.to_string(), caps.name(n).map(|m| m.as_str().to_string())))
        .collect();
    if !named.is_empty() {
        return Ok(Some(RawMatch::Named(named)));
    }

    if caps.len() > 1 {
        let groups = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        return Ok(Some(RawMatch::Groups(groups)));
    }

    Ok(caps.get(0).map(|m| RawMatch::Whole(m.as_str().to_string())))
}
