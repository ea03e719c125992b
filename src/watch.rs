use log::{debug, error, info};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use crate::engine::{EventKind, Preprocessor, TemplateEvent};
use crate::error::Result;

/// Feeds filesystem events under one root into a `Preprocessor`.
pub struct WatchSession {
    root: PathBuf,
}

impl WatchSession {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Watches the root recursively and dispatches each normalized event to
    /// `preprocessor`, one at a time and in arrival order.
    ///
    /// Runs until the watcher shuts down. Build failures are logged by the
    /// preprocessor and never end the session.
    ///
    /// # Returns
    /// * `Err(Error::WatchError)` - If the watcher cannot be started
    pub fn run<P: Preprocessor>(&self, preprocessor: &mut P) -> Result<()> {
        let (tx, rx) = channel::<notify::Result<notify::Event>>();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!("Watcher started on folder \"{}\"", self.root.display());

        for received in rx {
            match received {
                Ok(event) => {
                    for template_event in normalize_event(&event) {
                        preprocessor.dispatch(template_event);
                    }
                }
                Err(e) => error!("Watch error: {e}"),
            }
        }
        debug!("Watcher on \"{}\" stopped", self.root.display());
        Ok(())
    }
}

/// Translates a raw `notify` event into create/update/delete events.
///
/// Access notifications and events of unknown kind yield nothing.
pub fn normalize_event(event: &notify::Event) -> Vec<TemplateEvent> {
    use notify::EventKind as Raw;

    let each = |kind: EventKind| -> Vec<TemplateEvent> {
        event.paths.iter().map(|p| TemplateEvent::new(kind, p.clone())).collect()
    };

    match &event.kind {
        Raw::Create(_) => each(EventKind::Create),
        Raw::Remove(_) => each(EventKind::Delete),
        Raw::Modify(ModifyKind::Name(RenameMode::From)) => each(EventKind::Delete),
        Raw::Modify(ModifyKind::Name(RenameMode::To)) => each(EventKind::Create),
        Raw::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                TemplateEvent::new(EventKind::Delete, from.clone()),
                TemplateEvent::new(EventKind::Create, to.clone()),
            ],
            _ => each(EventKind::Update),
        },
        // Backends that cannot tell the rename direction: look at the disk.
        Raw::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() { EventKind::Create } else { EventKind::Delete };
                TemplateEvent::new(kind, p.clone())
            })
            .collect(),
        Raw::Modify(_) => each(EventKind::Update),
        Raw::Access(_) | Raw::Any | Raw::Other => Vec::new(),
    }
}
