//! Resolution of logical folder roles into filesystem locations.

use crate::config::FolderConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Resolves `role` into an absolute path.
///
/// # Arguments
/// * `folders` - Role to folder mapping of the active environment
/// * `role` - Role name, e.g. `layout.src` or `dest`
///
/// # Returns
/// * `Ok(PathBuf)` - Absolute location of the role's folder
/// * `Err(Error::ConfigurationError)` - If the role is not defined
pub fn resolve(folders: &FolderConfig, role: &str) -> Result<PathBuf> {
    let path = folders.get(role).ok_or_else(|| {
        let known: Vec<&str> = folders.roles().map(|(role, _)| role).collect();
        Error::ConfigurationError(format!(
            "folder role '{role}' is not defined (available: {})",
            known.join(", ")
        ))
    })?;
    Ok(std::path::absolute(path)?)
}

/// Resolves every role in `roles`, failing on the first missing one.
pub fn resolve_all<S: AsRef<str>>(folders: &FolderConfig, roles: &[S]) -> Result<Vec<PathBuf>> {
    roles.iter().map(|role| resolve(folders, role.as_ref())).collect()
}
