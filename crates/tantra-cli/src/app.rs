//! Process-wide wiring: config, logging, persistence, client, auth.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use tantra_api::ApiClient;
use tantra_auth::{AccessGuard, AuthContext, GuardDecision};
use tantra_config::{Config, ConfigManager, StorageConfig};
use tantra_core::{BroadcastNotifier, Notification, NotificationLevel};
use tantra_observability::LogManager;
use tantra_realtime::RealtimeChannel;
use tantra_store::{AppStore, CredentialStore, FileKeyValueStore, KeyValueStore};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct App {
    pub config: Config,
    pub store: AppStore,
    pub api: ApiClient,
    pub auth: AuthContext,
    pub notifier: Arc<BroadcastNotifier>,
    _log: LogManager,
}

impl App {
    pub async fn load(config_path: &Path, debug: bool) -> anyhow::Result<Self> {
        let manager = ConfigManager::load(config_path).await?;
        let config = manager.snapshot().await;

        let mut log = LogManager::init(&config.logging)?;
        if debug {
            log.update_level("debug")?;
        }

        let state_dir = resolve_state_dir(&config.storage)
            .ok_or_else(|| anyhow!("Could not resolve local state directory"))?;
        debug!("State directory: {:?}", state_dir);
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(state_dir));

        let store = AppStore::new(backend.clone(), config.storage.store_key.clone());
        if let Err(e) = store.hydrate().await {
            warn!("Starting with a fresh store: {}", e);
        }

        let credentials = CredentialStore::new(backend, config.storage.token_key.clone());
        let api = ApiClient::from_config(&config.api, &config.auth, credentials)
            .context("Invalid api configuration")?;

        let notifier = Arc::new(BroadcastNotifier::default());
        let auth = AuthContext::new(api.clone(), notifier.clone());
        auth.bootstrap().await;

        Ok(Self {
            config,
            store,
            api,
            auth,
            notifier,
            _log: log,
        })
    }

    pub fn channel(&self) -> RealtimeChannel {
        RealtimeChannel::from_config(
            &self.config.realtime,
            self.store.clone(),
            self.api.clone(),
            self.notifier.clone(),
        )
    }

    pub fn guard(&self) -> AccessGuard {
        AccessGuard::from_config(&self.config.auth)
    }

    /// Fail with a readable message unless `guard` lets the current user through
    pub fn require(&self, guard: &AccessGuard, location: &str) -> anyhow::Result<()> {
        match guard.check(&self.auth, location) {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Loading => bail!("Session is still loading"),
            GuardDecision::Redirect { to, from } => {
                debug!("Redirect {} -> {}", from, to);
                bail!("Not signed in. Run `tantra login` first.")
            }
            denied @ GuardDecision::Denied { .. } => {
                bail!("{}", denied.denial_message().unwrap_or_default())
            }
        }
    }

    /// Print notifications until the returned task is aborted
    pub fn print_notifications(&self) -> JoinHandle<()> {
        let mut rx = self.notifier.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(note) => print_notification(&note),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn persist(&self) {
        if let Err(e) = self.store.persist().await {
            warn!("Failed to persist store: {}", e);
        }
    }
}

pub fn print_notification(note: &Notification) {
    let line = match note.level {
        NotificationLevel::Success => format!("✅ {}", note.message).green(),
        NotificationLevel::Error => format!("❌ {}", note.message).red(),
        NotificationLevel::Info => format!("ℹ️  {}", note.message).cyan(),
    };
    println!("{}", line);
}

/// Print whatever is already queued without waiting
pub fn print_pending(rx: &mut broadcast::Receiver<Notification>) {
    while let Ok(note) = rx.try_recv() {
        print_notification(&note);
    }
}

/// `storage.path` when set, otherwise `~/.tantra/state`
pub fn resolve_state_dir(storage: &StorageConfig) -> Option<PathBuf> {
    match storage.path.as_deref() {
        Some(path) if !path.trim().is_empty() => tantra_config::expand_tilde(path.trim()),
        _ => tantra_config::default_state_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_state_dir() {
        let explicit = StorageConfig {
            path: Some("/var/lib/tantra".into()),
            ..StorageConfig::default()
        };
        assert_eq!(
            resolve_state_dir(&explicit),
            Some(PathBuf::from("/var/lib/tantra"))
        );

        let blank = StorageConfig {
            path: Some("  ".into()),
            ..StorageConfig::default()
        };
        assert_eq!(resolve_state_dir(&blank), tantra_config::default_state_dir());
    }
}
