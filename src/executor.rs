use log::debug;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, NodeError};
use crate::graph::TemplateNode;
use crate::includes::template_name;
use crate::renderer::TemplateRenderer;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Success,
    Failure(NodeError),
}

/// Outcome of one build or output removal for one template source.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
    pub path: PathBuf,
    pub outcome: BuildOutcome,
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl BuildResult {
    pub fn success(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: BuildOutcome::Success,
            written: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn failure(path: &Path, error: NodeError) -> Self {
        Self { outcome: BuildOutcome::Failure(error), ..Self::success(path) }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Success)
    }

    pub fn error(&self) -> Option<&NodeError> {
        match &self.outcome {
            BuildOutcome::Success => None,
            BuildOutcome::Failure(error) => Some(error),
        }
    }

    /// Gets a message describing the result.
    ///
    /// # Arguments
    /// * `detailed` - List every artifact touched instead of a count
    pub fn get_message(&self, detailed: bool) -> String {
        let path = self.path.display();
        match &self.outcome {
            BuildOutcome::Failure(error) => format!("Failed '{path}': {error}"),
            BuildOutcome::Success if !self.removed.is_empty() => {
                if detailed {
                    format!("Removed outputs of '{path}': {}", join_paths(&self.removed))
                } else {
                    format!("Removed {} output(s) of '{path}'", self.removed.len())
                }
            }
            BuildOutcome::Success if self.written.is_empty() => {
                format!("Checked '{path}' (no outputs)")
            }
            BuildOutcome::Success => {
                if detailed {
                    format!("Built '{path}' -> {}", join_paths(&self.written))
                } else {
                    format!("Built '{path}' ({} output(s))", self.written.len())
                }
            }
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| format!("'{}'", p.display())).collect::<Vec<_>>().join(", ")
}

/// Expands template nodes and writes their output artifacts.
pub struct BuildExecutor {
    renderer: Box<dyn TemplateRenderer>,
    source_root: PathBuf,
    /// Variables shared by every template
    context: serde_json::Value,
    /// Keep full renderer diagnostics in expansion errors
    debug: bool,
}

impl BuildExecutor {
    pub fn new(
        renderer: Box<dyn TemplateRenderer>,
        source_root: PathBuf,
        context: serde_json::Value,
        debug: bool,
    ) -> Self {
        Self { renderer, source_root, context, debug }
    }

    /// Expands `node` and writes the result to every output it declares.
    ///
    /// Never fails: read, expansion and write errors are returned inside the
    /// `BuildResult`. A node without outputs is only expanded, so broken
    /// partials still surface.
    pub fn build(&self, node: &TemplateNode) -> BuildResult {
        let content = match self.expand(node) {
            Ok(content) => content,
            Err(error) => return BuildResult::failure(&node.path, error),
        };

        let mut result = BuildResult::success(&node.path);
        for output in &node.outputs {
            debug!("Writing '{}'", output.display());
            match write_output(output, &content) {
                Ok(()) => result.written.push(output.clone()),
                Err(e) if result.is_success() => {
                    result.outcome = BuildOutcome::Failure(NodeError::Io {
                        path: output.clone(),
                        cause: e.to_string(),
                    });
                }
                Err(e) => debug!("Also failed to write '{}': {e}", output.display()),
            }
        }
        result
    }

    /// Deletes every output artifact owned by `node`.
    ///
    /// Already absent files are not an error; only files actually deleted are
    /// listed in `removed`.
    pub fn remove_outputs(&self, node: &TemplateNode) -> BuildResult {
        let mut result = BuildResult::success(&node.path);
        for output in &node.outputs {
            match fs::remove_file(output) {
                Ok(()) => result.removed.push(output.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Output '{}' already absent", output.display());
                }
                Err(e) if result.is_success() => {
                    result.outcome = BuildOutcome::Failure(NodeError::Io {
                        path: output.clone(),
                        cause: e.to_string(),
                    });
                }
                Err(e) => debug!("Also failed to remove '{}': {e}", output.display()),
            }
        }
        result
    }

    fn expand(&self, node: &TemplateNode) -> Result<String, NodeError> {
        let source = fs::read_to_string(&node.path).map_err(|e| NodeError::Unreadable {
            path: node.path.clone(),
            cause: e.to_string(),
        })?;
        let name = template_name(&self.source_root, &node.path);
        let context = self.page_context(node, name.as_deref());

        self.renderer.render(&source, &context, name.as_deref()).map_err(|e| {
            let cause = match e {
                Error::MinijinjaError(e) if self.debug => format!("{e:#}"),
                Error::MinijinjaError(e) => e.to_string(),
                other => other.to_string(),
            };
            NodeError::Expansion { path: node.path.clone(), cause }
        })
    }

    /// Shared context plus a `page` object describing the node being built.
    fn page_context(&self, node: &TemplateNode, name: Option<&str>) -> serde_json::Value {
        let mut context = self.context.as_object().cloned().unwrap_or_default();
        let outputs: Vec<String> =
            node.outputs.iter().map(|o| o.display().to_string()).collect();
        context.insert(
            "page".to_string(),
            json!({
                "name": name,
                "source": node.path.display().to_string(),
                "outputs": outputs,
            }),
        );
        serde_json::Value::Object(context)
    }
}

/// Writes `content` to `target` through a temporary file in the same
/// directory, so readers never see a half-written artifact. The temporary
/// file is deleted on every early return.
fn write_output(target: &Path, content: &str) -> std::io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| std::io::Error::other("output path has no parent directory"))?;
    fs::create_dir_all(parent)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::graph::NodeStatus;
    use crate::renderer::MiniJinjaRenderer;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn node(path: PathBuf, outputs: &[PathBuf]) -> TemplateNode {
        TemplateNode {
            path,
            outputs: outputs.iter().cloned().collect(),
            dependencies: BTreeSet::new(),
            optional: BTreeSet::new(),
            fingerprint: None,
            status: NodeStatus::Unknown,
            error: None,
        }
    }

    fn executor(root: &Path) -> BuildExecutor {
        BuildExecutor::new(
            Box::new(MiniJinjaRenderer::with_root(root)),
            root.to_path_buf(),
            json!({"site": "Demo"}),
            false,
        )
    }

    #[test]
    fn writes_every_declared_output() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.tpl"), "{{ site }}:{{ page.name }}").unwrap();

        let outputs = [tmp.path().join("out/a.html"), tmp.path().join("preview/a.html")];
        let result = executor(&src).build(&node(src.join("a.tpl"), &outputs));

        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.written.len(), 2);
        for output in &outputs {
            assert_eq!(fs::read_to_string(output).unwrap(), "Demo:a.tpl");
        }
    }

    #[test]
    fn expansion_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("broken.tpl"), "{% if %}").unwrap();

        let output = tmp.path().join("out/broken.html");
        let result =
            executor(&src).build(&node(src.join("broken.tpl"), &[output.clone()]));

        match result.error() {
            Some(NodeError::Expansion { path, cause }) => {
                assert_eq!(path, &src.join("broken.tpl"));
                assert!(!cause.is_empty());
            }
            other => panic!("Expected Expansion error, got {other:?}"),
        }
        assert!(result.written.is_empty());
        assert!(!output.exists());
    }

    #[test]
    fn failed_write_leaves_no_temporary_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        fs::create_dir_all(&src).unwrap();
        // a directory squats on the output path
        fs::create_dir_all(out.join("a.html")).unwrap();
        fs::write(src.join("a.tpl"), "A").unwrap();

        let result = executor(&src).build(&node(src.join("a.tpl"), &[out.join("a.html")]));

        assert!(matches!(result.error(), Some(NodeError::Io { .. })));
        let entries: Vec<_> = fs::read_dir(&out).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn unreadable_source_is_reported() {
        let tmp = TempDir::new().unwrap();
        let result = executor(tmp.path()).build(&node(tmp.path().join("gone.tpl"), &[]));
        assert!(matches!(result.error(), Some(NodeError::Unreadable { .. })));
    }

    #[test]
    fn nodes_without_outputs_are_only_expanded() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("nav.tpl"), "<nav/>").unwrap();
        let result = executor(tmp.path()).build(&node(tmp.path().join("nav.tpl"), &[]));
        assert!(result.is_success());
        assert!(result.written.is_empty());
        assert_eq!(
            result.get_message(false),
            format!("Checked '{}' (no outputs)", tmp.path().join("nav.tpl").display())
        );
    }

    #[test]
    fn remove_outputs_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("out/a.html");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, "A").unwrap();
        let node = node(tmp.path().join("a.tpl"), &[output.clone()]);
        let executor = executor(tmp.path());

        let first = executor.remove_outputs(&node);
        assert!(first.is_success());
        assert_eq!(first.removed, vec![output.clone()]);
        assert!(!output.exists());

        let second = executor.remove_outputs(&node);
        assert!(second.is_success());
        assert!(second.removed.is_empty());
    }

    struct FailingRenderer;

    impl TemplateRenderer for FailingRenderer {
        fn render(
            &self,
            _template: &str,
            _context: &serde_json::Value,
            _template_name: Option<&str>,
        ) -> Result<String> {
            Err(Error::Other(anyhow::anyhow!("renderer offline")))
        }
    }

    #[test]
    fn renderer_errors_become_expansion_failures() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.tpl"), "A").unwrap();
        let executor = BuildExecutor::new(
            Box::new(FailingRenderer),
            tmp.path().to_path_buf(),
            json!({}),
            true,
        );
        let result = executor.build(&node(tmp.path().join("a.tpl"), &[]));
        match result.error() {
            Some(NodeError::Expansion { cause, .. }) => assert_eq!(cause, "renderer offline"),
            other => panic!("Expected Expansion error, got {other:?}"),
        }
    }

    #[test]
    fn messages_depend_on_detail() {
        let mut result = BuildResult::success(Path::new("/t/src/a.tpl"));
        result.written = vec![PathBuf::from("/t/out/a.html")];
        assert_eq!(result.get_message(false), "Built '/t/src/a.tpl' (1 output(s))");
        assert_eq!(result.get_message(true), "Built '/t/src/a.tpl' -> '/t/out/a.html'");

        let failed = BuildResult::failure(
            Path::new("/t/src/b.tpl"),
            NodeError::StaleDependency {
                path: PathBuf::from("/t/src/b.tpl"),
                missing: vec![PathBuf::from("/t/src/a.tpl")],
            },
        );
        assert!(!failed.is_success());
        assert_eq!(
            failed.get_message(false),
            "Failed '/t/src/b.tpl': '/t/src/b.tpl' depends on missing '/t/src/a.tpl'."
        );
    }
}
