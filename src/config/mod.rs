//! Configuration management for templar
//!
//! This module contains the configuration system components:
//! - `types`: Folder roles and layout rules
//! - `loader`: Configuration file loading and environment selection

pub mod loader;
pub mod types;


// Re-export commonly used types for convenience
pub use loader::{Config, Environment};
pub use types::{FolderConfig, LayoutConfig};
