//! Gate hot reload.
//!
//! The config file's directory is watched rather than the file, so editors
//! that save by renaming a fresh file into place keep triggering reloads.
//! Only the `gate` section is applied at runtime, so a reload is forwarded
//! only when that section actually changed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{GateConfig, PortalConfig};

/// Decides which file events become gate reloads.
#[derive(Debug)]
struct ReloadFilter {
    file_name: Option<OsString>,
    last_gate: GateConfig,
}

impl ReloadFilter {
    fn new(path: &Path, current: &GateConfig) -> Self {
        Self {
            file_name: path.file_name().map(|n| n.to_os_string()),
            last_gate: current.clone(),
        }
    }

    /// A write, create or rename touching the config file.
    fn concerns(&self, event: &Event) -> bool {
        (event.kind.is_modify() || event.kind.is_create())
            && event
                .paths
                .iter()
                .any(|p| p.file_name().is_some_and(|n| Some(n) == self.file_name.as_deref()))
    }

    /// Pass the config on if its gate section differs from the last one sent.
    fn forward(&mut self, config: PortalConfig) -> Option<PortalConfig> {
        if config.gate == self.last_gate {
            return None;
        }
        self.last_gate = config.gate.clone();
        Some(config)
    }
}

/// Watches the configuration file and emits reloaded configs.
pub struct ConfigWatcher {
    path: PathBuf,
    filter: ReloadFilter,
    update_tx: mpsc::UnboundedSender<PortalConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration already in effect.
    pub fn new(path: &Path, current: &PortalConfig) -> (Self, mpsc::UnboundedReceiver<PortalConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            filter: ReloadFilter::new(path, &current.gate),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut filter,
            update_tx,
        } = self;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let config_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Watch error");
                        return;
                    }
                };
                if !filter.concerns(&event) {
                    return;
                }

                match load_config(&config_path) {
                    Ok(config) => match filter.forward(config) {
                        Some(config) => {
                            tracing::info!(path = ?config_path, "Gate configuration changed, reloading");
                            let _ = update_tx.send(config);
                        }
                        None => tracing::debug!("Config file changed outside the gate section, ignoring"),
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use notify::EventKind;

    fn filter() -> ReloadFilter {
        ReloadFilter::new(Path::new("/etc/portal/portal.toml"), &GateConfig::default())
    }

    #[test]
    fn test_only_events_on_the_config_file_count() {
        let filter = filter();

        let write = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/etc/portal/portal.toml".into());
        assert!(filter.concerns(&write));

        let renamed_in = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path("/etc/portal/portal.toml".into());
        assert!(filter.concerns(&renamed_in));

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/etc/portal/portal.toml".into());
        assert!(filter.concerns(&created));

        let swap_file = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/etc/portal/.portal.toml.swp".into());
        assert!(!filter.concerns(&swap_file));

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/etc/portal/portal.toml".into());
        assert!(!filter.concerns(&removed));
    }

    #[test]
    fn test_forwards_only_gate_changes() {
        let mut filter = filter();

        let mut unchanged_gate = PortalConfig::default();
        unchanged_gate.server.request_timeout_secs = 90;
        assert!(filter.forward(unchanged_gate).is_none());

        let mut new_gate = PortalConfig::default();
        new_gate.gate.rate_limit.max_requests = 10;
        assert!(filter.forward(new_gate.clone()).is_some());

        // Same gate again is a no-op.
        assert!(filter.forward(new_gate).is_none());

        let mut privileged = PortalConfig::default();
        privileged.gate.rate_limit.max_requests = 10;
        privileged.gate.privileged_emails = vec!["coach@example.com".into()];
        assert!(filter.forward(privileged).is_some());
    }
}
