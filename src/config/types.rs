//! Folder and layout types for configuration

use crate::constants::{
    DEFAULT_DESTINATION_ROLE, DEFAULT_OUTPUT_EXTENSION, DEFAULT_SOURCE_ROLE,
    DEFAULT_TEMPLATE_SUFFIX, ROLE_SEPARATOR,
};
use crate::error::{Error, Result};
use globset::Glob;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One entry of the raw `folders` tree: either a path or a nested group of roles.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FolderEntry {
    Path(PathBuf),
    Nested(IndexMap<String, FolderEntry>),
}

/// Mapping from a logical role name (`layout.src`, `dest`, ...) to a folder.
///
/// Nested configuration keys are flattened into dotted role names, so
/// `layout: { src: ./layout }` defines the role `layout.src`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "IndexMap<String, FolderEntry>")]
pub struct FolderConfig {
    roles: IndexMap<String, PathBuf>,
}

impl FolderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a role, builder style.
    pub fn with_role<S: Into<String>, P: Into<PathBuf>>(mut self, role: S, path: P) -> Self {
        self.roles.insert(role.into(), path.into());
        self
    }

    pub fn get(&self, role: &str) -> Option<&Path> {
        self.roles.get(role).map(PathBuf::as_path)
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.roles.iter().map(|(role, path)| (role.as_str(), path.as_path()))
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Returns a copy where every relative folder is joined onto `base`.
    pub fn rebase(&self, base: &Path) -> Self {
        let roles = self
            .roles
            .iter()
            .map(|(role, path)| {
                let path =
                    if path.is_absolute() { path.clone() } else { base.join(path) };
                (role.clone(), path)
            })
            .collect();
        Self { roles }
    }

    fn flatten_into(
        prefix: Option<&str>,
        entries: IndexMap<String, FolderEntry>,
        roles: &mut IndexMap<String, PathBuf>,
    ) {
        for (key, entry) in entries {
            let role = match prefix {
                Some(prefix) => format!("{prefix}{ROLE_SEPARATOR}{key}"),
                None => key,
            };
            match entry {
                FolderEntry::Path(path) => {
                    roles.insert(role, path);
                }
                FolderEntry::Nested(children) => {
                    Self::flatten_into(Some(&role), children, roles)
                }
            }
        }
    }
}

impl From<IndexMap<String, FolderEntry>> for FolderConfig {
    fn from(entries: IndexMap<String, FolderEntry>) -> Self {
        let mut roles = IndexMap::new();
        Self::flatten_into(None, entries, &mut roles);
        Self { roles }
    }
}

/// Structural rules mapping template sources to output artifacts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    /// Folder role scanned and watched for template sources.
    #[serde(default = "get_default_source_role")]
    pub source_role: String,
    /// Folder roles receiving one output artifact per page template.
    #[serde(default = "get_default_destinations")]
    pub destinations: Vec<String>,
    #[serde(default = "get_default_template_suffix")]
    pub template_suffix: String,
    #[serde(default = "get_default_output_extension")]
    pub output_extension: String,
    /// Drop the source directory structure under each destination.
    #[serde(default)]
    pub flatten: bool,
    /// Globs (relative to the source root) of dependency-only templates.
    #[serde(default)]
    pub partials: Vec<String>,
    /// Globs (relative to the source root) of templates to skip.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Variables exposed to every template.
    #[serde(default = "get_default_context")]
    pub context: serde_json::Value,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_role: get_default_source_role(),
            destinations: get_default_destinations(),
            template_suffix: get_default_template_suffix(),
            output_extension: get_default_output_extension(),
            flatten: false,
            partials: Vec::new(),
            ignore: Vec::new(),
            context: get_default_context(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(Error::ConfigurationError(
                "layout.destinations must name at least one folder role".into(),
            ));
        }
        if !self.template_suffix.starts_with('.') || self.template_suffix.len() < 2 {
            return Err(Error::ConfigurationError(
                "layout.template_suffix must start with '.' and have at least 1 character after it"
                    .into(),
            ));
        }
        if self.output_extension.is_empty() || self.output_extension.contains('/') {
            return Err(Error::ConfigurationError(
                "layout.output_extension must be a non-empty file extension".into(),
            ));
        }
        if !self.context.is_object() {
            return Err(Error::ConfigurationError(
                "layout.context must be a mapping".into(),
            ));
        }
        for pattern in self.partials.iter().chain(self.ignore.iter()) {
            Glob::new(pattern).map_err(|e| {
                Error::ConfigurationError(format!("invalid glob '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }
}

fn get_default_source_role() -> String {
    DEFAULT_SOURCE_ROLE.to_string()
}

fn get_default_destinations() -> Vec<String> {
    vec![DEFAULT_DESTINATION_ROLE.to_string()]
}

fn get_default_template_suffix() -> String {
    DEFAULT_TEMPLATE_SUFFIX.to_string()
}

fn get_default_output_extension() -> String {
    DEFAULT_OUTPUT_EXTENSION.to_string()
}

fn get_default_context() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
