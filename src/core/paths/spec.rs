use std::collections::BTreeMap;

/// Template name plus the parameters that fill it.
///
/// A parameter with no value (or an empty one) counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSpec {
    pub name: Option<String>,
    pub params: BTreeMap<String, Option<String>>,
}

impl PathSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, Some(value.into()));
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        self.params.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Parameter names that are present but unset.
    pub fn unset_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(_, v)| v.as_deref().map_or(true, str::is_empty))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn is_configured(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty()) && !self.params.is_empty()
    }
}
