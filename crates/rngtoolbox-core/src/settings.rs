//! Settings persistence.
//!
//! [`SettingsStore`] reads and writes one [`SessionConfig`] as JSON. It never
//! fails towards its caller: a missing or unreadable file yields the default
//! record (written back to disk on a best-effort basis), and save failures are
//! logged.
//!
//! [`SettingsWriter`] puts a single task in front of the store so that rapid
//! successive edits are written in order. Saves still queued when a newer one
//! arrives are skipped, so the file always ends at the newest record.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};

use crate::config::SessionConfig;
use crate::error::PersistenceError;

/// File name of the persisted record inside the application config directory.
pub const SETTINGS_FILE: &str = "collect_settings.json";

/// Application directory under the platform config dir.
pub const APP_DIR: &str = "rngtoolbox";

/// Loads and saves the session configuration at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/rngtoolbox/collect_settings.json`.
    pub fn default_location() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted record, synthesizing and persisting the default if
    /// there is none or it cannot be read.
    pub async fn load(&self) -> SessionConfig {
        match self.try_load().await {
            Ok(config) => {
                log::debug!("loaded settings from {}", self.path.display());
                config
            }
            Err(e) => {
                if e.is_not_found() {
                    log::info!("no settings at {}, creating defaults", self.path.display());
                } else {
                    log::warn!("{e}; falling back to defaults");
                }
                let config = SessionConfig::default();
                if let Err(e) = self.try_save(&config).await {
                    log::warn!("failed to create settings file: {e}");
                }
                config
            }
        }
    }

    /// Persist `config`, logging any failure.
    pub async fn save(&self, config: &SessionConfig) {
        if let Err(e) = self.try_save(config).await {
            log::warn!("failed to save settings: {e}");
        }
    }

    pub async fn try_load(&self) -> Result<SessionConfig, PersistenceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        serde_json::from_str(&contents).map_err(|e| PersistenceError::json(&self.path, e))
    }

    /// Write `config` atomically: temp file in the same directory, then rename.
    pub async fn try_save(&self, config: &SessionConfig) -> Result<(), PersistenceError> {
        self.ensure_dir().await?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| PersistenceError::json(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))
    }

    async fn ensure_dir(&self) -> Result<(), PersistenceError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PersistenceError::io(dir, e)),
            _ => Ok(()),
        }
    }
}

enum WriteCommand {
    Save(SessionConfig),
    Flush(oneshot::Sender<()>),
}

/// Serialized, coalescing front end to a [`SettingsStore`].
///
/// Cloning yields another handle to the same writer task. The task exits once
/// every handle is dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct SettingsWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl SettingsWriter {
    /// Spawn the writer task. Must be called within a tokio runtime.
    pub fn spawn(store: SettingsStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(store, rx));
        Self { tx }
    }

    /// Queue `config` for saving. Returns immediately.
    pub fn save(&self, config: SessionConfig) {
        if self.tx.send(WriteCommand::Save(config)).is_err() {
            log::warn!("settings writer has stopped; change not persisted");
        }
    }

    /// Wait until every save queued before this call is on disk.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn writer_loop(store: SettingsStore, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(command) = rx.recv().await {
        let mut latest = None;
        let mut acks = Vec::new();
        match command {
            WriteCommand::Save(config) => latest = Some(config),
            WriteCommand::Flush(ack) => acks.push(ack),
        }
        // Drain whatever queued up meanwhile; only the newest record matters.
        while let Ok(command) = rx.try_recv() {
            match command {
                WriteCommand::Save(config) => latest = Some(config),
                WriteCommand::Flush(ack) => acks.push(ack),
            }
        }
        if let Some(config) = latest {
            store.save(&config).await;
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
    log::debug!("settings writer stopped");
}
