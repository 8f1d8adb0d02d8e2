//! Persisted agent state: the boot counter and a configuration snapshot,
//! both keyed by engine ID.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::util::to_hex;

use super::community::CommunityTable;
use super::notification::NotificationTarget;
use super::vacm::VacmSnapshot;

/// snmpEngineBoots latches at this value (RFC 3414 Section 2.2.2).
pub const MAX_ENGINE_BOOTS: u32 = 2_147_483_647;

/// Persisted boot counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootRecord {
    pub engine_id: String,
    pub boots: u32,
}

/// Configuration written at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub engine_id: String,
    pub communities: CommunityTable,
    pub vacm: VacmSnapshot,
    #[serde(default)]
    pub notification_targets: Vec<NotificationTarget>,
}

/// Storage collaborator for agent state.
pub trait StateStore: Send + Sync + 'static {
    /// Stored boot count, 0 if nothing was stored yet.
    fn load_boots<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<u32>>;

    fn save_boots<'a>(&'a self, engine_id: &'a [u8], boots: u32) -> BoxFuture<'a, Result<()>>;

    fn load_config<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<Option<ConfigSnapshot>>>;

    fn save_config<'a>(
        &'a self,
        engine_id: &'a [u8],
        snapshot: &'a ConfigSnapshot,
    ) -> BoxFuture<'a, Result<()>>;

    /// Increment and persist the boot counter, returning the new value.
    fn increment_boots<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<u32>> {
        Box::pin(async move {
            let boots = self
                .load_boots(engine_id)
                .await?
                .saturating_add(1)
                .min(MAX_ENGINE_BOOTS);
            self.save_boots(engine_id, boots).await?;
            Ok(boots)
        })
    }
}

/// JSON files in one directory, `<engine-id-hex>.boots.json` and
/// `<engine-id-hex>.config.json`.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, engine_id: &[u8], kind: &str) -> PathBuf {
        self.dir.join(format!("{}.{kind}.json", to_hex(engine_id)))
    }

    async fn read<T: serde::de::DeserializeOwned>(path: PathBuf) -> Result<Option<T>> {
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::State { path, source }),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| Error::StateFormat { path, source })
    }

    /// Write through a temporary file so a crash never leaves half a file.
    async fn write<T: Serialize>(&self, path: PathBuf, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value).map_err(|source| Error::StateFormat {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        let state_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::State { path, source }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(state_err(&self.dir))?;
        tokio::fs::write(&tmp, &data).await.map_err(state_err(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(state_err(&path))?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load_boots<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<u32>> {
        Box::pin(async move {
            let record: Option<BootRecord> = Self::read(self.path(engine_id, "boots")).await?;
            Ok(record.map_or(0, |r| r.boots))
        })
    }

    fn save_boots<'a>(&'a self, engine_id: &'a [u8], boots: u32) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let record = BootRecord {
                engine_id: to_hex(engine_id),
                boots,
            };
            self.write(self.path(engine_id, "boots"), &record).await
        })
    }

    fn load_config<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<Option<ConfigSnapshot>>> {
        Box::pin(Self::read(self.path(engine_id, "config")))
    }

    fn save_config<'a>(
        &'a self,
        engine_id: &'a [u8],
        snapshot: &'a ConfigSnapshot,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.write(self.path(engine_id, "config"), snapshot).await })
    }
}

/// Volatile state, lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    boots: Mutex<HashMap<Vec<u8>, u32>>,
    configs: Mutex<HashMap<Vec<u8>, ConfigSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_boots<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<u32>> {
        let boots = self.boots.lock().get(engine_id).copied().unwrap_or(0);
        Box::pin(async move { Ok(boots) })
    }

    fn save_boots<'a>(&'a self, engine_id: &'a [u8], boots: u32) -> BoxFuture<'a, Result<()>> {
        self.boots.lock().insert(engine_id.to_vec(), boots);
        Box::pin(async { Ok(()) })
    }

    fn load_config<'a>(&'a self, engine_id: &'a [u8]) -> BoxFuture<'a, Result<Option<ConfigSnapshot>>> {
        let config = self.configs.lock().get(engine_id).cloned();
        Box::pin(async move { Ok(config) })
    }

    fn save_config<'a>(
        &'a self,
        engine_id: &'a [u8],
        snapshot: &'a ConfigSnapshot,
    ) -> BoxFuture<'a, Result<()>> {
        self.configs
            .lock()
            .insert(engine_id.to_vec(), snapshot.clone());
        Box::pin(async { Ok(()) })
    }
}
