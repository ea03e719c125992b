//! Constants used throughout the templar application

/// Configuration file used when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "./data/config.yml";

/// Environment used when `--env` is not given
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Folder role scanned and watched for template sources
pub const DEFAULT_SOURCE_ROLE: &str = "layout.src";

/// Folder role that receives output artifacts
pub const DEFAULT_DESTINATION_ROLE: &str = "dest";

/// Default template file suffix
pub const DEFAULT_TEMPLATE_SUFFIX: &str = ".tpl";

/// Default extension of output artifacts
pub const DEFAULT_OUTPUT_EXTENSION: &str = "html";

/// Separator joining nested folder keys into a role name
pub const ROLE_SEPARATOR: char = '.';

/// Exit codes
pub mod exit_codes {
    pub const FAILURE: i32 = 1;
}

/// Verbosity levels; build results log at info, so that is the default
pub mod verbosity {
    pub const INFO: u8 = 0;
    pub const DEBUG: u8 = 1;
    pub const TRACE: u8 = 2;
}
