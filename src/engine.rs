use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Environment;
use crate::error::{NodeError, Result};
use crate::executor::{BuildExecutor, BuildResult};
use crate::fingerprint::Fingerprint;
use crate::graph::{discover, Discovery, NodeStatus, TemplateGraph};
use crate::layout::OutputLayout;
use crate::renderer::{MiniJinjaRenderer, TemplateRenderer};

/// Kind of a normalized filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// One normalized filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEvent {
    pub kind: EventKind,
    pub path: PathBuf,
}

impl TemplateEvent {
    pub fn new<P: Into<PathBuf>>(kind: EventKind, path: P) -> Self {
        Self { kind, path: path.into() }
    }
}

/// Every `BuildResult` produced by one full build or one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub results: Vec<BuildResult>,
}

impl BuildReport {
    pub fn push(&mut self, result: BuildResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, other: BuildReport) {
        self.results.extend(other.results);
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn successes(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// True when no result failed; an empty report counts as success.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Paths of the results, in the order they were produced.
    pub fn paths(&self) -> Vec<&Path> {
        self.results.iter().map(|r| r.path.as_path()).collect()
    }

    /// Logs every result: successes at info, stale nodes at warn and other
    /// failures at error level.
    pub fn log(&self, detailed: bool) {
        for result in &self.results {
            let message = result.get_message(detailed);
            match result.error() {
                None => info!("{message}"),
                Some(NodeError::StaleDependency { .. }) => warn!("{message}"),
                Some(_) => error!("{message}"),
            }
        }
    }
}

/// The two operations the rest of the program drives a build through.
pub trait Preprocessor {
    /// Scans the source root and builds every template.
    ///
    /// # Returns
    /// * `Err(Error::ScanError)` - If the source root cannot be read
    /// * `Ok(BuildReport)` - Otherwise, even when some nodes failed
    fn process_templates(&mut self) -> Result<BuildReport>;

    /// Applies one filesystem event and rebuilds what it affects.
    ///
    /// Never fails: every problem is reported inside the `BuildReport`.
    fn update_templates(&mut self, path: &Path, kind: EventKind) -> BuildReport;

    fn dispatch(&mut self, event: TemplateEvent) -> BuildReport {
        self.update_templates(&event.path, event.kind)
    }
}

/// Owns the template graph and the build executor of one environment.
pub struct Engine {
    layout: OutputLayout,
    graph: TemplateGraph,
    executor: BuildExecutor,
    /// Last seen content of the plain files templates include
    inputs: HashMap<PathBuf, Fingerprint>,
    /// Detailed build messages
    debug: bool,
}

impl Engine {
    /// Resolves the folder roles of `environment` and prepares an engine
    /// rendering with MiniJinja.
    ///
    /// # Returns
    /// * `Err(Error::ConfigurationError)` - If a role is missing or the layout is invalid
    pub fn new(environment: &Environment, debug: bool) -> Result<Self> {
        let layout = OutputLayout::resolve(&environment.folders, &environment.layout)?;
        // Watch events carry canonical paths; node keys must match them.
        let root = layout
            .source_root()
            .canonicalize()
            .unwrap_or_else(|_| layout.source_root().to_path_buf());
        let layout = layout.with_source_root(root.clone());

        let renderer = MiniJinjaRenderer::with_root(&root);
        let executor =
            BuildExecutor::new(Box::new(renderer), root, environment.layout.context.clone(), debug);

        Ok(Self { layout, graph: TemplateGraph::new(), executor, inputs: HashMap::new(), debug })
    }

    /// Replaces the template renderer, keeping the shared context.
    pub fn with_renderer(
        mut self,
        renderer: Box<dyn TemplateRenderer>,
        context: serde_json::Value,
    ) -> Self {
        self.executor = BuildExecutor::new(
            renderer,
            self.layout.source_root().to_path_buf(),
            context,
            self.debug,
        );
        self
    }

    pub fn graph(&self) -> &TemplateGraph {
        &self.graph
    }

    pub fn source_root(&self) -> &Path {
        self.layout.source_root()
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Maps an event path onto the canonical form used for node keys.
    ///
    /// Deleted files cannot be canonicalized, so their parent is.
    fn normalize(&self, path: &Path) -> PathBuf {
        if path.starts_with(self.source_root()) {
            return path.to_path_buf();
        }
        if let Ok(canonical) = path.canonicalize() {
            return canonical;
        }
        match (path.parent().map(Path::canonicalize), path.file_name()) {
            (Some(Ok(parent)), Some(name)) => parent.join(name),
            _ => path.to_path_buf(),
        }
    }

    fn on_create(&mut self, path: &Path) -> BuildReport {
        if let Err(e) = self.insert(path) {
            return failed(path, e);
        }
        let order = self.graph.affected(path);
        self.rebuild(order)
    }

    fn on_update(&mut self, path: &Path) -> BuildReport {
        if !path.exists() {
            debug!("'{}' vanished before its update was handled", path.display());
            return self.on_delete(path);
        }
        let discovery = match discover(&self.layout, path) {
            Ok(discovery) => discovery,
            Err(e) => {
                self.graph.set_failed(path, e.clone());
                return failed(path, e);
            }
        };

        if let Some(node) = self.graph.get(path) {
            let unchanged = node.fingerprint.as_ref() == Some(&discovery.fingerprint);
            if unchanged && node.status != NodeStatus::Stale {
                debug!("'{}' unchanged ({}), skipping", path.display(), discovery.fingerprint);
                return BuildReport::default();
            }
        }

        // a rejected update leaves the node exactly as it was
        if let Err(e) = self.apply(path, discovery) {
            return failed(path, e);
        }
        let order = self.graph.affected(path);
        self.rebuild(order)
    }

    /// Discovers the template at `path` and upserts it into the graph.
    fn insert(&mut self, path: &Path) -> std::result::Result<(), NodeError> {
        let discovery = discover(&self.layout, path)?;
        self.apply(path, discovery)
    }

    fn apply(&mut self, path: &Path, discovery: Discovery) -> std::result::Result<(), NodeError> {
        let Discovery { fingerprint, dependencies, optional, outputs } = discovery;
        self.graph
            .upsert(path, dependencies, outputs)
            .map_err(|e| NodeError::from_error(path, e))?;
        self.graph.set_optional(path, optional);
        self.graph.set_fingerprint(path, fingerprint);
        Ok(())
    }

    /// A plain file some templates include changed: rebuild them.
    fn on_input_changed(&mut self, path: &Path) -> BuildReport {
        if !path.is_file() {
            return self.on_delete(path);
        }
        match Fingerprint::of_file(path) {
            Ok(fingerprint) => {
                if self.inputs.get(path) == Some(&fingerprint) {
                    debug!("'{}' unchanged ({fingerprint}), skipping", path.display());
                    return BuildReport::default();
                }
                self.inputs.insert(path.to_path_buf(), fingerprint);
            }
            Err(e) => debug!("Cannot fingerprint '{}': {e}", path.display()),
        }
        debug!("'{}' is included by templates, rebuilding them", path.display());
        let order = self.graph.affected_by([path]);
        self.rebuild(order)
    }

    /// A directory appeared under the source root, usually moved in whole:
    /// discovers the templates inside it and builds them with whatever
    /// already depends on them or on the plain files it holds.
    fn on_directory_created(&mut self, dir: &Path) -> BuildReport {
        let mut report = BuildReport::default();
        let mut changed = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || self.graph.contains(path) {
                continue;
            }
            if self.layout.is_template(path) {
                match self.insert(path) {
                    Ok(()) => changed.push(path.to_path_buf()),
                    Err(e) => report.push(BuildResult::failure(path, e)),
                }
            } else if self.graph.is_input(path) {
                if let Ok(fingerprint) = Fingerprint::of_file(path) {
                    self.inputs.insert(path.to_path_buf(), fingerprint);
                }
                changed.push(path.to_path_buf());
            }
        }
        debug!("Found {} new source(s) under '{}'", changed.len(), dir.display());
        let order = self.graph.affected_by(changed.iter().map(PathBuf::as_path));
        report.extend(self.rebuild(order));
        report
    }

    /// Deletes the node at `path`, or every node under it when `path` is a
    /// removed directory. Nodes left without a dependency turn stale.
    fn on_delete(&mut self, path: &Path) -> BuildReport {
        if self.graph.contains(path) {
            let mut report = BuildReport::default();
            report.push(self.remove_node(path));
            report.extend(self.mark_downstream_stale([path]));
            return report;
        }
        if self.graph.is_input(path) {
            self.inputs.remove(path);
            return self.mark_downstream_stale([path]);
        }

        let nested: BTreeSet<PathBuf> = self.graph.nodes_under(path).into_iter().collect();
        let inputs = self.graph.inputs_under(path);
        if nested.is_empty() && inputs.is_empty() {
            debug!("No template known at '{}'", path.display());
            return BuildReport::default();
        }
        let mut report = BuildReport::default();
        // dependents go first
        let order: Vec<PathBuf> = self
            .graph
            .topological_order()
            .into_iter()
            .filter(|p| nested.contains(p))
            .rev()
            .collect();
        for node_path in &order {
            report.push(self.remove_node(node_path));
        }
        for input in &inputs {
            self.inputs.remove(input);
        }
        let removed: Vec<&Path> = order.iter().chain(&inputs).map(PathBuf::as_path).collect();
        report.extend(self.mark_downstream_stale(removed));
        report
    }

    fn remove_node(&mut self, path: &Path) -> BuildResult {
        match self.graph.remove(path) {
            Some(node) => self.executor.remove_outputs(&node),
            None => BuildResult::success(path),
        }
    }

    /// Marks every node depending on one of `removed` stale, when it now
    /// lacks a source.
    fn mark_downstream_stale<'a, I>(&mut self, removed: I) -> BuildReport
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut report = BuildReport::default();
        for dependent in self.graph.affected_by(removed) {
            let missing = self.stale_inputs(&dependent);
            if missing.is_empty() {
                continue;
            }
            if let Some(e) = self.graph.mark_stale(&dependent, missing) {
                report.push(BuildResult::failure(&dependent, e));
            }
        }
        report
    }

    /// Builds `order`, which must be topologically sorted.
    fn rebuild(&mut self, order: Vec<PathBuf>) -> BuildReport {
        let mut report = BuildReport::default();
        for node_path in order {
            report.push(self.build_node(&node_path));
        }
        report
    }

    /// Builds one node unless one of its inputs is missing, in which case
    /// the node is marked stale instead.
    fn build_node(&mut self, path: &Path) -> BuildResult {
        let missing = self.stale_inputs(path);
        if !missing.is_empty() {
            return match self.graph.mark_stale(path, missing) {
                Some(e) => BuildResult::failure(path, e),
                None => BuildResult::success(path),
            };
        }
        let Some(node) = self.graph.get(path) else {
            return BuildResult::success(path);
        };

        let result = self.executor.build(node);
        match result.error() {
            None => self.graph.set_built(path),
            Some(e) => self.graph.set_failed(path, e.clone()),
        }
        result
    }

    /// Missing sources `path` depends on, directly or through stale
    /// dependencies.
    fn stale_inputs(&self, path: &Path) -> Vec<PathBuf> {
        let mut missing: BTreeSet<PathBuf> =
            self.graph.missing_dependencies(path).into_iter().collect();
        let Some(node) = self.graph.get(path) else {
            return Vec::new();
        };
        for dependency in &node.dependencies {
            if let Some(NodeError::StaleDependency { missing: inherited, .. }) =
                self.graph.get(dependency).and_then(|d| d.error.as_ref())
            {
                missing.extend(inherited.iter().cloned());
            }
        }
        missing.into_iter().collect()
    }
}

fn failed(path: &Path, error: NodeError) -> BuildReport {
    BuildReport { results: vec![BuildResult::failure(path, error)] }
}

impl Preprocessor for Engine {
    fn process_templates(&mut self) -> Result<BuildReport> {
        info!("Processing templates in '{}'", self.source_root().display());
        self.graph = TemplateGraph::scan(&self.layout)?;
        self.inputs = self
            .graph
            .inputs_under(self.layout.source_root())
            .into_iter()
            .filter_map(|p| Fingerprint::of_file(&p).ok().map(|f| (p, f)))
            .collect();

        let mut report = BuildReport::default();
        for path in self.graph.topological_order() {
            let scan_failure = self
                .graph
                .get(&path)
                .filter(|node| node.status == NodeStatus::Failed)
                .and_then(|node| node.error.clone());
            match scan_failure {
                Some(e) => report.push(BuildResult::failure(&path, e)),
                None => report.push(self.build_node(&path)),
            }
        }

        report.log(self.debug);
        info!(
            "Processed {} template(s), {} failure(s)",
            report.results.len(),
            report.failure_count()
        );
        Ok(report)
    }

    fn update_templates(&mut self, path: &Path, kind: EventKind) -> BuildReport {
        let path = self.normalize(path);
        debug!("Handling {kind} event for '{}'", path.display());

        let report = match kind {
            EventKind::Delete => self.on_delete(&path),
            _ if self.layout.is_template(&path) => {
                if self.graph.contains(&path) {
                    self.on_update(&path)
                } else {
                    self.on_create(&path)
                }
            }
            _ if self.graph.is_input(&path) => self.on_input_changed(&path),
            EventKind::Create if path.is_dir() && path.starts_with(self.source_root()) => {
                self.on_directory_created(&path)
            }
            _ => {
                debug!("'{}' is not a template source, ignoring", path.display());
                BuildReport::default()
            }
        };
        report.log(self.debug);
        report
    }
}
