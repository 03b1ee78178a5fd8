use std::collections::BTreeMap;

use crate::core::error::{AccessError, AccessResult};

/// Default delimiter used to join keyed sub-patterns.
pub const DEFAULT_DELIMITER: &str = "-";

/// Characters an object id may not start with; such inputs look like paths.
pub const PATH_LEADERS: [char; 3] = ['/', '$', '.'];

/// Declarative description of how an object id is matched.
///
/// Either a custom `regex` is given (used verbatim inside the `objectid`
/// group), or a list of `keys` from which a named-group pattern is
/// synthesized, or neither, in which case a greedy match takes the whole
/// input as the object id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternOptions {
    pub regex: Option<String>,
    pub keys: Vec<String>,
    /// Per-key sub-patterns; keys without an entry match anything.
    pub keymap: BTreeMap<String, String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub order: Vec<String>,
    pub delimiter: Option<String>,
    /// Record the generated patterns in the parse output.
    pub record_inputs: bool,
}

impl PatternOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = Some(regex.into());
        self
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_key_pattern(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.keymap.insert(key.into(), pattern.into());
        self
    }

    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn recording_inputs(mut self) -> Self {
        self.record_inputs = true;
        self
    }

    pub fn delimiter(&self) -> &str {
        self.delimiter
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DELIMITER)
    }

    /// The keys that end up in the synthesized pattern, in pattern order.
    ///
    /// `exclude` removes names; `order` (or else `include`) restricts to the
    /// named subset. Without `order` the original key order is kept.
    pub fn selected_keys(&self) -> AccessResult<Vec<String>> {
        for (label, names) in [("order", &self.order), ("include", &self.include)] {
            if let Some(missing) = names.iter().find(|n| !self.keys.contains(n)) {
                return Err(AccessError::Parsing(format!(
                    "{label} references key \"{missing}\" which is not one of {:?}",
                    self.keys
                )));
            }
        }

        let mut keys: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !self.exclude.contains(k))
            .cloned()
            .collect();

        let subset = if !self.order.is_empty() {
            &self.order
        } else {
            &self.include
        };
        if !subset.is_empty() {
            keys.retain(|k| subset.contains(k));
        }

        if !self.order.is_empty() {
            keys.sort_by_key(|k| self.order.iter().position(|o| o == k));
        }

        Ok(keys)
    }

    /// Build the object id pattern (without anchors).
    pub fn object_pattern(&self) -> AccessResult<String> {
        if let Some(regex) = self.regex.as_deref().filter(|r| !r.is_empty()) {
            return Ok(format!("(?P<objectid>(?:{regex}))"));
        }

        if self.keys.is_empty() {
            return Ok(r"(?P<objectid>[^/$.].*)".to_string());
        }

        let keys = self.selected_keys()?;
        if keys.is_empty() {
            return Err(AccessError::Parsing(
                "include/exclude/order options leave no keys to build a pattern from".into(),
            ));
        }

        let patts: Vec<String> = keys
            .iter()
            .map(|k| match self.keymap.get(k) {
                Some(p) => format!("(?P<{k}>{p})"),
                None => format!("(?P<{k}>(?:.+)?)"),
            })
            .collect();

        let delimiter = regex::escape(self.delimiter());
        Ok(format!("(?P<objectid>(?:{}))", patts.join(&delimiter)))
    }
}
