/// Handles argument parsing and the top-level workflow.
pub mod cli;

/// Configuration files, environments and layout rules.
pub mod config;

pub mod constants;

/// Defines custom error types.
pub mod error;

/// Full and incremental builds.
pub mod engine;

/// Expands template nodes and writes their outputs.
pub mod executor;

pub mod fingerprint;

/// Dependency model between template sources.
pub mod graph;

/// Discovery of `include`/`extends`/`import` dependencies.
pub mod includes;

/// Maps template sources to output artifacts.
pub mod layout;

/// Resolves folder roles to absolute paths.
pub mod paths;

/// Template parsing and rendering functionality.
pub mod renderer;

/// Filesystem watching.
pub mod watch;
