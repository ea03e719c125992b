use crate::{
    cli::Args,
    config::Config,
    engine::{BuildReport, Engine, Preprocessor},
    error::Result,
    watch::WatchSession,
};
use log::{info, warn};

/// Loads the configuration, runs the full build and, when asked, the watch
/// session.
pub struct Runner {
    args: Args,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Executes the build workflow.
    ///
    /// Node failures are logged and do not fail the run; configuration,
    /// scan and watcher errors do.
    pub fn run(self) -> Result<BuildReport> {
        let config = Config::load_config(&self.args.config)?;
        let environment = config.environment(&self.args.env)?;
        info!("Using environment '{}' from '{}'", self.args.env, self.args.config.display());

        let mut engine = Engine::new(environment, self.args.debug)?;
        let report = engine.process_templates()?;

        if self.args.sync {
            warn!("Asset sync is not implemented; '--sync' has no effect");
        }

        if self.args.watch {
            WatchSession::new(engine.source_root()).run(&mut engine)?;
        }
        Ok(report)
    }
}

/// Runs the build described by `args`.
pub fn run(args: Args) -> Result<BuildReport> {
    Runner::new(args).run()
}
