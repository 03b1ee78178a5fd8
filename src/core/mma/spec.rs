// ─── Tool Spec ───
// Declarative bundle a tool hands to the core: which path template its files
// follow, default path parameters, which parameters come from the release's
// version bundle, and how object ids are matched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use crate::core::error::{AccessError, AccessResult};
use crate::core::parsing::{InputParser, ParsedInput, PatternOptions};
use crate::core::paths::{PathSpec, PathTemplates};
use crate::core::version::VersionResolver;

/// Path parameters filled from the release's version bundle,
/// written `category:key1,key2` (the category is optional).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedVersion {
    pub category: Option<String>,
    pub keys: Vec<String>,
}

impl FromStr for MappedVersion {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, keys) = match s.split_once(':') {
            Some((c, k)) => (Some(c.trim()).filter(|c| !c.is_empty()), k),
            None => (None, s),
        };
        let keys: Vec<String> = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if keys.is_empty() {
            return Err(AccessError::Config(format!(
                "mapped version \"{s}\" names no version keys"
            )));
        }
        Ok(Self {
            category: category.map(str::to_string),
            keys,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    path_name: Option<String>,
    template_keys: Vec<String>,
    defaults: BTreeMap<String, String>,
    mapped_version: Option<MappedVersion>,
    parser: InputParser,
}

#[derive(Debug, Clone, Default)]
pub struct ToolSpecBuilder {
    path_name: Option<String>,
    defaults: BTreeMap<String, String>,
    mapped_version: Option<String>,
    options: PatternOptions,
}

impl ToolSpec {
    pub fn builder() -> ToolSpecBuilder {
        ToolSpecBuilder::default()
    }

    pub fn path_name(&self) -> Option<&str> {
        self.path_name.as_deref()
    }

    pub fn template_keys(&self) -> &[String] {
        &self.template_keys
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    pub fn mapped_version(&self) -> Option<&MappedVersion> {
        self.mapped_version.as_ref()
    }

    pub fn parser(&self) -> &InputParser {
        &self.parser
    }

    pub fn parse(&self, value: &str) -> AccessResult<ParsedInput> {
        self.parser.parse(value)
    }

    /// Fill the path parameters for `parsed`.
    ///
    /// Each template key takes, in order: the parsed field, the default, the
    /// mapped version for `release`. Keys with none of these stay unset.
    pub fn path_spec(
        &self,
        parsed: &ParsedInput,
        versions: &VersionResolver,
        release: &str,
    ) -> AccessResult<PathSpec> {
        let Some(name) = &self.path_name else {
            return Ok(PathSpec::default());
        };

        let mut spec = PathSpec::new(name);
        for key in &self.template_keys {
            let value = if let Some(v) = parsed.field(key) {
                Some(v.to_string())
            } else if let Some(v) = self.defaults.get(key) {
                Some(v.clone())
            } else {
                match &self.mapped_version {
                    Some(mapped) if mapped.keys.contains(key) => {
                        Some(versions.get_version(mapped.category.as_deref(), release, key)?)
                    }
                    _ => None,
                }
            };
            spec.set(key.clone(), value);
        }
        Ok(spec)
    }

    /// Path parameters encoded in a concrete filename, if it fits the template.
    pub fn params_from_filename(
        &self,
        templates: &PathTemplates,
        path: &Path,
    ) -> AccessResult<Option<BTreeMap<String, String>>> {
        match &self.path_name {
            Some(name) => templates.extract(name, path),
            None => Ok(None),
        }
    }
}

impl ToolSpecBuilder {
    pub fn path_name(mut self, name: impl Into<String>) -> Self {
        self.path_name = Some(name.into());
        self
    }

    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn mapped_version(mut self, mapped: impl Into<String>) -> Self {
        self.mapped_version = Some(mapped.into());
        self
    }

    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        self.options = self.options.with_regex(regex);
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.with_keys(keys);
        self
    }

    pub fn keymap(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.options = self.options.with_key_pattern(key, pattern);
        self
    }

    pub fn include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.with_include(names);
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.with_exclude(names);
        self
    }

    pub fn order<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.with_order(names);
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options = self.options.with_delimiter(delimiter);
        self
    }

    pub fn record_inputs(mut self) -> Self {
        self.options = self.options.recording_inputs();
        self
    }

    /// Compile the bundle against the registered path templates.
    ///
    /// Without explicit keys or pattern, the parser matches the template
    /// keys that are neither defaulted nor version-mapped.
    pub fn build(self, templates: &PathTemplates) -> AccessResult<ToolSpec> {
        let mapped_version = self
            .mapped_version
            .as_deref()
            .map(MappedVersion::from_str)
            .transpose()?;

        let template_keys = match &self.path_name {
            Some(name) => templates.lookup_keys(name)?,
            None => Vec::new(),
        };

        let mut options = self.options;
        if options.keys.is_empty() && options.regex.is_none() && !template_keys.is_empty() {
            let skip: BTreeSet<&str> = self
                .defaults
                .keys()
                .map(String::as_str)
                .chain(
                    mapped_version
                        .iter()
                        .flat_map(|m| m.keys.iter().map(String::as_str)),
                )
                .collect();
            options.keys = template_keys
                .iter()
                .filter(|k| !skip.contains(k.as_str()))
                .cloned()
                .collect();
        }

        Ok(ToolSpec {
            path_name: self.path_name,
            template_keys,
            defaults: self.defaults,
            mapped_version,
            parser: InputParser::new(options)?,
        })
    }
}
