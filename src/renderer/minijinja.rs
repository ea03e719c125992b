use super::filters;
use crate::{error::Result, renderer::interface::TemplateRenderer};
use minijinja::Environment;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Name given to templates rendered without one.
const INLINE_TEMPLATE_NAME: &str = "<inline>";

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
    /// Default context that will be merged with any provided context
    default_context: serde_json::Value,
    /// Directory `include`/`extends`/`import` names are looked up in
    template_root: Option<PathBuf>,
}

impl MiniJinjaRenderer {
    /// Creates a new MiniJinjaRenderer instance with default environment.
    pub fn new() -> Self {
        let mut env = Environment::new();
        let default_context = json!({
            "templar": {
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        filters::register(&mut env);

        Self { env, default_context, template_root: None }
    }

    /// Creates a renderer that resolves included templates under `root`.
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        let mut renderer = Self::new();
        renderer.template_root = Some(root.as_ref().to_path_buf());
        renderer
    }

    /// Compiles `template` in a copy of the environment whose loader reads
    /// the template root.
    ///
    /// The loader is fresh for every render, so edited includes are never
    /// served from a previous build's cache.
    fn render_internal(
        &self,
        template: &str,
        context: &serde_json::Value,
        template_name: Option<&str>,
    ) -> Result<String> {
        let mut env = self.env.clone();
        if let Some(root) = &self.template_root {
            env.set_loader(minijinja::path_loader(root));
        }
        let name = template_name.unwrap_or(INLINE_TEMPLATE_NAME);
        env.add_template_owned(name.to_string(), template.to_string())?;

        let compiled = env.get_template(name)?;
        Ok(compiled.render(self.merge_context(context))?)
    }

    /// Page variables override the defaults. A non-object context is used
    /// as is.
    fn merge_context(&self, context: &serde_json::Value) -> serde_json::Value {
        match (self.default_context.as_object(), context.as_object()) {
            (Some(defaults), Some(page)) => {
                let mut merged = defaults.clone();
                merged.extend(page.iter().map(|(k, v)| (k.clone(), v.clone())));
                serde_json::Value::Object(merged)
            }
            _ => context.clone(),
        }
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(
        &self,
        template: &str,
        context: &serde_json::Value,
        template_name: Option<&str>,
    ) -> Result<String> {
        self.render_internal(template, context, template_name)
    }
}
