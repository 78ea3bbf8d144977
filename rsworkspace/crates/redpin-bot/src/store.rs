//! Per-guild settings store, persisted as one JSON document.
//!
//! The whole mapping is rewritten on every mutation. A failed write is
//! reported to the caller but the in-memory change is kept.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use redpin_types::GuildSettings;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read settings file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write settings file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Owner of the guild → settings mapping and its persisted form.
pub struct GuildSettingsStore {
    path: PathBuf,
    guilds: RwLock<BTreeMap<String, GuildSettings>>,
}

impl GuildSettingsStore {
    /// Load the store from `path`, creating an empty file if it is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let guilds = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            let mut guilds: BTreeMap<String, GuildSettings> = serde_json::from_str(&content)
                .map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            for settings in guilds.values_mut() {
                settings.normalize();
            }
            info!(
                "Loaded settings for {} guild(s) from {}",
                guilds.len(),
                path.display()
            );
            guilds
        } else {
            info!("No settings file at {}, creating one", path.display());
            fs::write(&path, "{}").map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
            BTreeMap::new()
        };

        Ok(Self {
            path,
            guilds: RwLock::new(guilds),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of a guild's settings; defaults are inserted on first access.
    pub fn get(&self, guild_id: u64) -> GuildSettings {
        let key = guild_id.to_string();
        if let Some(settings) = self
            .guilds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return settings.clone();
        }

        self.guilds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone()
    }

    /// Apply `mutator` to a guild's settings and persist the full store.
    ///
    /// Returns the settings as stored. On a persistence error the mutation
    /// stays applied in memory.
    pub fn update<F>(&self, guild_id: u64, mutator: F) -> Result<GuildSettings, StoreError>
    where
        F: FnOnce(&mut GuildSettings),
    {
        // Held until the file is written: writes land in mutation order.
        let mut guilds = self.guilds.write().unwrap_or_else(PoisonError::into_inner);
        let settings = guilds.entry(guild_id.to_string()).or_default();
        mutator(settings);
        settings.normalize();
        let updated = settings.clone();

        let serialized = serde_json::to_string_pretty(&*guilds)?;
        if let Err(source) = fs::write(&self.path, serialized) {
            error!(
                "Failed to persist settings for guild {} to {}: {}",
                guild_id,
                self.path.display(),
                source
            );
            return Err(StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }
        drop(guilds);

        debug!("Saved settings for guild {}", guild_id);
        Ok(updated)
    }
}
