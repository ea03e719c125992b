use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::{FolderConfig, LayoutConfig};
use crate::error::Result;
use crate::paths;

/// `LayoutConfig` resolved against concrete folders.
///
/// Decides which files are template sources and where their output
/// artifacts go.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    source_root: PathBuf,
    destinations: Vec<PathBuf>,
    template_suffix: String,
    output_extension: String,
    flatten: bool,
    partials: GlobSet,
    ignore: GlobSet,
}

impl OutputLayout {
    /// Resolves the source and destination roles named by `layout`.
    ///
    /// # Returns
    /// * `Err(Error::ConfigurationError)` - If a role is missing or the layout is invalid
    pub fn resolve(folders: &FolderConfig, layout: &LayoutConfig) -> Result<Self> {
        layout.validate()?;
        let source_root = paths::resolve(folders, &layout.source_role)?;
        let destinations = paths::resolve_all(folders, &layout.destinations)?;
        debug!(
            "Resolved source root '{}' and destinations {:?}",
            source_root.display(),
            destinations
        );

        Ok(Self {
            source_root,
            destinations,
            template_suffix: layout.template_suffix.clone(),
            output_extension: layout.output_extension.clone(),
            flatten: layout.flatten,
            partials: build_globset(&layout.partials)?,
            ignore: build_globset(&layout.ignore)?,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn destinations(&self) -> &[PathBuf] {
        &self.destinations
    }

    /// Replaces the source root, e.g. with its canonical form.
    pub fn with_source_root(mut self, source_root: PathBuf) -> Self {
        self.source_root = source_root;
        self
    }

    /// Checks whether `path` is a template source this layout builds.
    ///
    /// # Returns
    /// * `true` - if the path is under the source root, carries the template
    ///   suffix and matches no ignore pattern
    /// * `false` - otherwise
    pub fn is_template(&self, path: &Path) -> bool {
        let Some(relative) = self.relative(path) else {
            return false;
        };
        let has_suffix = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name.len() > self.template_suffix.len()
                    && name.ends_with(&self.template_suffix)
            });
        has_suffix && !self.ignore.is_match(relative)
    }

    /// Checks whether `path` is a dependency-only template.
    pub fn is_partial(&self, path: &Path) -> bool {
        self.relative(path).is_some_and(|relative| self.partials.is_match(relative))
    }

    /// Output artifacts of the template at `path`, one per destination.
    ///
    /// Partials and paths outside the source root produce none.
    pub fn outputs_for(&self, path: &Path) -> BTreeSet<PathBuf> {
        if self.is_partial(path) {
            return BTreeSet::new();
        }
        let Some(relative) = self.relative(path) else {
            return BTreeSet::new();
        };
        let Some(target) = self.target_name(relative) else {
            return BTreeSet::new();
        };
        self.destinations.iter().map(|dest| dest.join(&target)).collect()
    }

    fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.source_root).ok().filter(|r| !r.as_os_str().is_empty())
    }

    /// Removes the template suffix and appends the output extension.
    fn target_name(&self, relative: &Path) -> Option<PathBuf> {
        let file_name = relative.file_name()?.to_str()?;
        let stem = file_name.strip_suffix(&self.template_suffix)?;
        let output_name = format!("{stem}.{}", self.output_extension);
        match relative.parent() {
            Some(parent) if !self.flatten => Some(parent.join(output_name)),
            _ => Some(PathBuf::from(output_name)),
        }
    }
}

/// Builds a `GlobSet` from patterns relative to the source root.
///
/// `*` does not cross directory separators; `**` does.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        debug!("Adding layout pattern: {pattern} to globset");
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}
