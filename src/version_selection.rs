use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{entity_kind::EntityKind, version_store, AppError, AppResult};

pub const SELECTION_KEY_PREFIX: &str = "versionSelection";

pub fn selection_key(kind: EntityKind, entity_id: &str) -> String {
    format!("{SELECTION_KEY_PREFIX}:{}:{entity_id}", kind.as_str())
}

trait SelectionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn save(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl SelectionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Flat JSON object on disk, rewritten atomically on every save.
struct JsonFileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read selection store {}", path.display()))?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("parse selection store {}", path.display()))?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

impl SelectionStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        let encoded = {
            let guard = self
                .data
                .lock()
                .map_err(|_| anyhow::anyhow!("selection store lock poisoned"))?;
            serde_json::to_vec_pretty(&*guard)?
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("replace selection store {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn SelectionStore + Send + Sync>,
}

impl StoreHandle {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    pub fn json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let store = JsonFileStore::open(path.as_ref()).map_err(AppError::from)?;
        Ok(Self {
            inner: Arc::new(store),
        })
    }

    pub fn snapshot(&self, kind: EntityKind, entity_id: &str) -> Option<String> {
        self.inner.get(&selection_key(kind, entity_id))
    }

    fn write(&self, kind: EntityKind, entity_id: &str, version_id: &str) {
        self.inner.set(&selection_key(kind, entity_id), version_id);
    }

    fn persist(&self) -> anyhow::Result<()> {
        self.inner.save()
    }
}

/// Records `version_id` as the version to reopen for this entity.
pub fn remember_version(
    store: &StoreHandle,
    kind: EntityKind,
    entity_id: &str,
    version_id: &str,
) -> AppResult<()> {
    store.write(kind, entity_id, version_id);
    store
        .persist()
        .context("persist version selection")
        .map_err(AppError::from)
}

/// Drops the remembered version for this entity, if any.
pub fn forget_version(store: &StoreHandle, kind: EntityKind, entity_id: &str) {
    store.inner.remove(&selection_key(kind, entity_id));
    if let Err(err) = store.persist() {
        warn!(
            target: "grimorium",
            event = "version_selection_save_failed",
            entity_kind = kind.as_str(),
            entity_id = %entity_id,
            error = %err
        );
    }
}

async fn main_version_id(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: &str,
) -> AppResult<Option<String>> {
    let versions = version_store::list::<serde_json::Value>(pool, kind, entity_id).await?;
    Ok(versions.into_iter().find(|v| v.is_main).map(|v| v.id))
}

/// Id of the version to open for an entity.
///
/// The remembered id wins while it still belongs to the entity; otherwise the
/// main version is chosen and remembered. `None` when the entity has no
/// versions at all.
pub async fn resolve_selected_version(
    pool: &SqlitePool,
    store: &StoreHandle,
    kind: EntityKind,
    entity_id: &str,
) -> AppResult<Option<String>> {
    let reason = match store.snapshot(kind, entity_id) {
        Some(candidate) => {
            match version_store::owner_of(pool, kind, &candidate).await? {
                Some(owner) if owner == entity_id => return Ok(Some(candidate)),
                Some(_) => "foreign",
                None => "not_found",
            }
        }
        None => "missing",
    };

    let Some(fallback) = main_version_id(pool, kind, entity_id).await? else {
        return Ok(None);
    };
    store.write(kind, entity_id, &fallback);
    store
        .persist()
        .context("persist version selection")
        .map_err(AppError::from)?;
    info!(
        target: "grimorium",
        event = "version_selection_fallback",
        entity_kind = kind.as_str(),
        entity_id = %entity_id,
        reason,
        chosen_id = %fallback
    );
    Ok(Some(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keys_are_scoped_by_kind_and_entity() {
        assert_eq!(
            selection_key(EntityKind::Character, "c-1"),
            "versionSelection:character:c-1"
        );
        assert_ne!(
            selection_key(EntityKind::Item, "x"),
            selection_key(EntityKind::Race, "x")
        );
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("selection.json");

        let store = StoreHandle::json_file(&path).expect("open store");
        remember_version(&store, EntityKind::Region, "r-1", "v-2").expect("remember");

        let reopened = StoreHandle::json_file(&path).expect("reopen store");
        assert_eq!(
            reopened.snapshot(EntityKind::Region, "r-1").as_deref(),
            Some("v-2")
        );

        forget_version(&reopened, EntityKind::Region, "r-1");
        let again = StoreHandle::json_file(&path).expect("reopen store");
        assert!(again.snapshot(EntityKind::Region, "r-1").is_none());
    }

    #[test]
    fn corrupt_json_store_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("selection.json");
        std::fs::write(&path, "{oops").expect("write");
        assert!(StoreHandle::json_file(&path).is_err());
    }
}
