use crate::error::Result;

/// Trait for template expansion engines.
///
/// The build executor only needs to turn template text into output text;
/// how includes, filters and variables work is up to the implementation.
pub trait TemplateRenderer {
    /// Renders a template string with the given context.
    ///
    /// # Arguments
    /// * `template` - Template source text
    /// * `context` - Context variables for rendering
    /// * `template_name` - Name of the template relative to the source root,
    ///   used for error messages and relative lookups
    ///
    /// # Returns
    /// * `Result<String>` - Rendered template string
    fn render(
        &self,
        template: &str,
        context: &serde_json::Value,
        template_name: Option<&str>,
    ) -> Result<String>;
}
