//! Dependency model between template sources and their output artifacts.
//!
//! Every template source known to the engine is a [`TemplateNode`]. A node
//! declares the sources it depends on (includes, base templates); a declared
//! dependency that is itself a node forms an edge. The graph keeps two
//! invariants at all times:
//!
//! - edges never form a cycle
//! - every output artifact has exactly one owning node
//!
//! Mutations that would break either are rejected without touching the graph.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, NodeError, Result};
use crate::fingerprint::Fingerprint;
use crate::includes;
use crate::layout::OutputLayout;

/// Last-build status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Discovered or re-derived, not built since.
    Unknown,
    Built,
    Failed,
    /// Depends, directly or transitively, on a source that no longer exists.
    Stale,
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Unknown => "unknown",
            NodeStatus::Built => "built",
            NodeStatus::Failed => "failed",
            NodeStatus::Stale => "stale",
        };
        write!(f, "{s}")
    }
}

/// One template source file.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub path: PathBuf,
    pub outputs: BTreeSet<PathBuf>,
    /// Declared dependencies, including ones that do not exist (yet).
    pub dependencies: BTreeSet<PathBuf>,
    /// Dependencies declared with `ignore missing`.
    pub optional: BTreeSet<PathBuf>,
    pub fingerprint: Option<Fingerprint>,
    pub status: NodeStatus,
    /// Failure recorded by the last build, scan or staleness check.
    pub error: Option<NodeError>,
}

impl TemplateNode {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            outputs: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            optional: BTreeSet::new(),
            fingerprint: None,
            status: NodeStatus::Unknown,
            error: None,
        }
    }
}

/// What reading a template source reveals about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub fingerprint: Fingerprint,
    pub dependencies: BTreeSet<PathBuf>,
    pub optional: BTreeSet<PathBuf>,
    pub outputs: BTreeSet<PathBuf>,
}

/// Reads the source at `path` and derives its fingerprint, declared
/// dependencies and output artifacts.
pub fn discover(layout: &OutputLayout, path: &Path) -> Result<Discovery, NodeError> {
    let content = std::fs::read(path).map_err(|e| NodeError::Unreadable {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;
    let text = String::from_utf8_lossy(&content);
    let dependencies = includes::dependencies(layout.source_root(), &text);
    Ok(Discovery {
        fingerprint: Fingerprint::of_bytes(&content),
        dependencies: dependencies.all,
        optional: dependencies.optional,
        outputs: layout.outputs_for(path),
    })
}

#[derive(Debug, Default)]
pub struct TemplateGraph {
    nodes: BTreeMap<PathBuf, TemplateNode>,
    /// Output artifact -> owning source.
    owners: HashMap<PathBuf, PathBuf>,
}

impl TemplateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks the source root and builds the graph of every template found.
    ///
    /// Fails only when the root itself cannot be read. A file that cannot be
    /// read, or whose edges would form a cycle or claim another node's
    /// output, becomes a `Failed` node and the scan goes on. Nodes with a
    /// missing dependency, and their dependents, are marked `Stale`.
    pub fn scan(layout: &OutputLayout) -> Result<Self> {
        let root = layout.source_root();
        std::fs::read_dir(root).map_err(|e| Error::ScanError {
            root: root.display().to_string(),
            e: e.to_string(),
        })?;

        let mut discovered = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(Error::ScanError {
                        root: root.display().to_string(),
                        e: e.to_string(),
                    })
                }
                Err(e) => {
                    warn!("Skipping unreadable entry during scan: {e}");
                    continue;
                }
            };
            if entry.file_type().is_file() && layout.is_template(entry.path()) {
                let path = entry.path().to_path_buf();
                discovered.push((path.clone(), discover(layout, &path)));
            }
        }

        let mut graph = Self::new();
        for (path, _) in &discovered {
            graph.nodes.insert(path.clone(), TemplateNode::new(path.clone()));
        }
        for (path, discovery) in discovered {
            let discovery = match discovery {
                Ok(discovery) => discovery,
                Err(e) => {
                    graph.set_failed(&path, e);
                    continue;
                }
            };
            match graph.upsert(&path, discovery.dependencies, discovery.outputs) {
                Ok(()) => graph.set_optional(&path, discovery.optional),
                Err(e) => {
                    warn!("{e}");
                    graph.set_failed(&path, NodeError::from_error(&path, e));
                }
            }
            graph.set_fingerprint(&path, discovery.fingerprint);
        }

        let incomplete: Vec<PathBuf> = graph
            .nodes
            .keys()
            .filter(|path| !graph.missing_dependencies(path).is_empty())
            .cloned()
            .collect();
        for path in incomplete {
            let missing = graph.missing_dependencies(&path);
            for stale in graph.affected(&path) {
                graph.mark_stale(&stale, missing.clone());
            }
        }

        debug!("Scanned {} template(s) under '{}'", graph.len(), root.display());
        Ok(graph)
    }

    /// Inserts or replaces the node at `path`.
    ///
    /// The node's status is reset to `Unknown`; its fingerprint is kept.
    ///
    /// # Returns
    /// * `Err(Error::CycleError)` - If a dependency already depends on `path`
    /// * `Err(Error::OutputConflictError)` - If an output is owned by another node
    ///
    /// On error the graph is left unchanged.
    pub fn upsert(
        &mut self,
        path: &Path,
        dependencies: BTreeSet<PathBuf>,
        outputs: BTreeSet<PathBuf>,
    ) -> Result<()> {
        for dependency in &dependencies {
            if dependency == path || self.depends_on(dependency, path) {
                return Err(Error::CycleError {
                    path: path.to_path_buf(),
                    dependency: dependency.clone(),
                });
            }
        }
        for output in &outputs {
            if let Some(owner) = self.owners.get(output).filter(|owner| *owner != path) {
                return Err(Error::OutputConflictError {
                    path: path.to_path_buf(),
                    output: output.clone(),
                    owner: owner.clone(),
                });
            }
        }

        let node = self
            .nodes
            .entry(path.to_path_buf())
            .or_insert_with(|| TemplateNode::new(path.to_path_buf()));
        for old in &node.outputs {
            self.owners.remove(old);
        }
        for output in &outputs {
            self.owners.insert(output.clone(), path.to_path_buf());
        }
        node.dependencies = dependencies;
        node.outputs = outputs;
        node.status = NodeStatus::Unknown;
        node.error = None;
        Ok(())
    }

    /// Deletes the node at `path`.
    ///
    /// Edges touching it disappear with it; nodes that declared it as a
    /// dependency keep the declaration, which now counts as missing. Output
    /// artifacts on disk are left alone.
    pub fn remove(&mut self, path: &Path) -> Option<TemplateNode> {
        let node = self.nodes.remove(path)?;
        for output in &node.outputs {
            self.owners.remove(output);
        }
        Some(node)
    }

    /// The node at `path` followed by every node that depends on it,
    /// directly or transitively, in topological order: dependencies always
    /// come before their dependents.
    ///
    /// Returns an empty sequence for unknown paths.
    pub fn affected(&self, path: &Path) -> Vec<PathBuf> {
        if !self.nodes.contains_key(path) {
            return Vec::new();
        }
        self.affected_by([path])
    }

    /// Every node among `changed`, plus every node that depends on one of
    /// them directly or transitively, in topological order.
    ///
    /// Changed paths need not be nodes: a plain file that templates include
    /// yields the templates including it.
    pub fn affected_by<'a, I>(&self, changed: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut members = BTreeSet::new();
        let mut queue = Vec::new();
        for path in changed {
            if self.nodes.contains_key(path) && members.insert(path.to_path_buf()) {
                queue.push(path.to_path_buf());
            }
            for dependent in self.dependents(path) {
                if members.insert(dependent.clone()) {
                    queue.push(dependent);
                }
            }
        }
        while let Some(current) = queue.pop() {
            for dependent in self.dependents(&current) {
                if members.insert(dependent.clone()) {
                    queue.push(dependent);
                }
            }
        }
        self.topological_subset(&members)
    }

    /// Every node in topological order.
    pub fn topological_order(&self) -> Vec<PathBuf> {
        let members: BTreeSet<PathBuf> = self.nodes.keys().cloned().collect();
        self.topological_subset(&members)
    }

    /// Nodes that list `path` as a direct dependency.
    pub fn dependents(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .values()
            .filter(|node| node.dependencies.contains(path))
            .map(|node| node.path.clone())
            .collect()
    }

    /// Required dependencies of `path` that are neither nodes nor files on
    /// disk.
    pub fn missing_dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .get(path)
            .map(|node| {
                node.dependencies
                    .iter()
                    .filter(|dep| {
                        !self.nodes.contains_key(*dep)
                            && !node.optional.contains(*dep)
                            && !dep.is_file()
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether some node declares `path` as a dependency without it being a
    /// node itself, e.g. an included `.html` file or an ignored template.
    pub fn is_input(&self, path: &Path) -> bool {
        !self.nodes.contains_key(path) && !self.dependents(path).is_empty()
    }

    /// Declared dependencies under `dir` that are not nodes.
    pub fn inputs_under(&self, dir: &Path) -> BTreeSet<PathBuf> {
        self.nodes
            .values()
            .flat_map(|node| node.dependencies.iter())
            .filter(|dep| dep.starts_with(dir) && !self.nodes.contains_key(*dep))
            .cloned()
            .collect()
    }

    /// Known nodes located under the directory `dir`.
    pub fn nodes_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.nodes
            .keys()
            .filter(|path| path.starts_with(dir) && path.as_path() != dir)
            .cloned()
            .collect()
    }

    pub fn get(&self, path: &Path) -> Option<&TemplateNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn owner_of(&self, output: &Path) -> Option<&Path> {
        self.owners.get(output).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateNode> {
        self.nodes.values()
    }

    pub fn set_optional(&mut self, path: &Path, optional: BTreeSet<PathBuf>) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.optional = optional;
        }
    }

    pub fn set_fingerprint(&mut self, path: &Path, fingerprint: Fingerprint) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.fingerprint = Some(fingerprint);
        }
    }

    pub fn set_built(&mut self, path: &Path) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.status = NodeStatus::Built;
            node.error = None;
        }
    }

    pub fn set_failed(&mut self, path: &Path, error: NodeError) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.status = NodeStatus::Failed;
            node.error = Some(error);
        }
    }

    /// Marks `path` stale because `missing` no longer exist.
    ///
    /// Returns the recorded error, or `None` for unknown paths.
    pub fn mark_stale(&mut self, path: &Path, missing: Vec<PathBuf>) -> Option<NodeError> {
        let node = self.nodes.get_mut(path)?;
        let error = NodeError::StaleDependency { path: path.to_path_buf(), missing };
        node.status = NodeStatus::Stale;
        node.error = Some(error.clone());
        Some(error)
    }

    /// Whether `from` reaches `to` by following dependency edges.
    fn depends_on(&self, from: &Path, to: &Path) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![from.to_path_buf()];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.dependencies.iter().cloned());
            }
        }
        false
    }

    /// Kahn's algorithm over `members`, ties broken by path order.
    fn topological_subset(&self, members: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let mut pending: BTreeMap<&PathBuf, usize> = BTreeMap::new();
        for path in members {
            let count = self.nodes[path]
                .dependencies
                .iter()
                .filter(|dep| members.contains(*dep))
                .count();
            pending.insert(path, count);
        }

        let mut ready: BTreeSet<&PathBuf> =
            pending.iter().filter(|(_, count)| **count == 0).map(|(path, _)| *path).collect();
        let mut order = Vec::with_capacity(members.len());
        while let Some(path) = ready.pop_first() {
            order.push(path.clone());
            for dependent in members {
                if self.nodes[dependent].dependencies.contains(path) {
                    if let Some(count) = pending.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            ready.insert(dependent);
                        }
                    }
                }
            }
        }
        order
    }
}
