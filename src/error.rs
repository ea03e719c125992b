use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal errors: startup, configuration and graph-integrity failures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration. Original error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON configuration. Original error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid glob pattern. Original error: {0}")]
    GlobSetParseError(#[from] globset::Error),

    #[error("Failed to render. Original error: {0}")]
    MinijinjaError(#[from] minijinja::Error),

    #[error("File watcher failed. Original error: {0}")]
    WatchError(#[from] notify::Error),

    /// A required folder role or layout rule is missing or invalid.
    #[error("Configuration error: {0}.")]
    ConfigurationError(String),

    #[error("No configuration file found at '{config_path}'.")]
    ConfigNotFound { config_path: String },

    /// The source root itself could not be read.
    #[error("Cannot scan source root '{root}'. Original error: {e}")]
    ScanError { root: String, e: String },

    /// A graph mutation would introduce a circular dependency.
    #[error("Dependency cycle: '{path}' cannot depend on '{dependency}'.")]
    CycleError { path: PathBuf, dependency: PathBuf },

    /// Two template sources claim the same output artifact.
    #[error("Output '{output}' of '{path}' is already owned by '{owner}'.")]
    OutputConflictError { path: PathBuf, output: PathBuf, owner: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience type alias for Results with the crate error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failure of a single template node, recorded in its `BuildResult`.
///
/// Node failures are data: they are reported to the caller and never abort
/// sibling nodes or the watch session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Failed to expand '{path}'. Original error: {cause}")]
    Expansion { path: PathBuf, cause: String },

    #[error("'{}' depends on missing '{}'.", .path.display(), display_paths(.missing))]
    StaleDependency { path: PathBuf, missing: Vec<PathBuf> },

    #[error("Dependency cycle: '{path}' cannot depend on '{dependency}'.")]
    Cycle { path: PathBuf, dependency: PathBuf },

    #[error("Output '{output}' of '{path}' is already owned by '{owner}'.")]
    OutputConflict { path: PathBuf, output: PathBuf, owner: PathBuf },

    #[error("Cannot read '{path}'. Original error: {cause}")]
    Unreadable { path: PathBuf, cause: String },

    #[error("IO error on '{path}': {cause}")]
    Io { path: PathBuf, cause: String },
}

impl NodeError {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::Expansion { .. } => "expansion",
            NodeError::StaleDependency { .. } => "stale-dependency",
            NodeError::Cycle { .. } => "cycle",
            NodeError::OutputConflict { .. } => "output-conflict",
            NodeError::Unreadable { .. } => "unreadable",
            NodeError::Io { .. } => "io",
        }
    }
}

impl NodeError {
    /// Records a fatal-kind error as the failure of the node at `path`.
    pub fn from_error(path: &Path, err: Error) -> Self {
        match err {
            Error::CycleError { path, dependency } => NodeError::Cycle { path, dependency },
            Error::OutputConflictError { path, output, owner } => {
                NodeError::OutputConflict { path, output, owner }
            }
            other => NodeError::Io { path: path.to_path_buf(), cause: other.to_string() },
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("', '")
}

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(crate::constants::exit_codes::FAILURE);
}
