//! Template expansion.
//!
//! - `interface`: the `TemplateRenderer` seam used by the build executor
//! - `minijinja`: the default MiniJinja implementation
//! - `filters`: string filters registered with MiniJinja

pub mod filters;
pub mod interface;
pub mod minijinja;

pub use interface::TemplateRenderer;
pub use self::minijinja::MiniJinjaRenderer;
