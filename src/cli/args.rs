use crate::constants::{verbosity, DEFAULT_CONFIG_FILE, DEFAULT_ENVIRONMENT};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// CLI arguments for Templar.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (YAML or JSON).
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Environment to build, as named in the configuration.
    #[arg(short, long, value_name = "NAME", default_value = DEFAULT_ENVIRONMENT)]
    pub env: String,

    /// Detailed build reports; implies at least debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Keep running and rebuild templates as their sources change.
    #[arg(short, long)]
    pub watch: bool,

    /// Sync static assets (not implemented).
    #[arg(long)]
    pub sync: bool,

    /// Increase logging verbosity beyond info (`-v` debug, `-vv` trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse command line arguments.
pub fn get_args() -> Args {
    Args::parse()
}

/// Map `-v` counts to the appropriate log level.
pub fn get_log_level_from_verbose(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        verbosity::INFO => LevelFilter::Info,
        verbosity::DEBUG => LevelFilter::Debug,
        verbosity::TRACE.. => LevelFilter::Trace,
    }
}

/// Log level for the parsed arguments: `--debug` raises it to at least
/// `Debug`.
pub fn get_log_level(args: &Args) -> LevelFilter {
    let level = get_log_level_from_verbose(args.verbose);
    if args.debug {
        level.max(LevelFilter::Debug)
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_verbose_flags_to_log_filters() {
        assert_eq!(get_log_level_from_verbose(0), LevelFilter::Info);
        assert_eq!(get_log_level_from_verbose(verbosity::INFO), LevelFilter::Info);
        assert_eq!(get_log_level_from_verbose(verbosity::DEBUG), LevelFilter::Debug);
        assert_eq!(get_log_level_from_verbose(verbosity::TRACE), LevelFilter::Trace);
        assert_eq!(get_log_level_from_verbose(verbosity::TRACE + 1), LevelFilter::Trace);
    }

    #[test]
    fn parses_defaults() {
        let args = Args::parse_from(["templar"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(args.env, DEFAULT_ENVIRONMENT);
        assert!(!args.debug);
        assert!(!args.watch);
        assert!(!args.sync);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn parses_full_feature_flags() {
        let args = Args::parse_from([
            "templar",
            "--config",
            "site/config.json",
            "--env",
            "prod",
            "--debug",
            "--watch",
            "--sync",
            "-vv",
        ]);
        assert_eq!(args.config, PathBuf::from("site/config.json"));
        assert_eq!(args.env, "prod");
        assert!(args.debug);
        assert!(args.watch);
        assert!(args.sync);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn debug_raises_the_log_level() {
        let args = Args::parse_from(["templar", "--debug"]);
        assert_eq!(get_log_level(&args), LevelFilter::Debug);

        let args = Args::parse_from(["templar", "--debug", "-vvv"]);
        assert_eq!(get_log_level(&args), LevelFilter::Trace);

        let args = Args::parse_from(["templar", "-v"]);
        assert_eq!(get_log_level(&args), LevelFilter::Debug);

        // build results are logged at info, so they show without flags
        let args = Args::parse_from(["templar"]);
        assert_eq!(get_log_level(&args), LevelFilter::Info);
    }
}
