use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    entities::EntitySnapshot,
    model_versions::{version_not_found, CreateVersionData, UpdateVersionData, Version},
    version_selection::{self, StoreHandle},
    version_store, AppResult,
};

use super::VersionHandlers;

/// Version handlers backed by the app database, bound to one entity.
#[derive(Clone)]
pub struct SqliteVersionHandlers<T> {
    pool: SqlitePool,
    selection: StoreHandle,
    entity_id: String,
    _snapshot: PhantomData<fn() -> T>,
}

impl<T: EntitySnapshot> SqliteVersionHandlers<T> {
    pub fn new(pool: SqlitePool, selection: StoreHandle, entity_id: impl Into<String>) -> Self {
        Self {
            pool,
            selection,
            entity_id: entity_id.into(),
            _snapshot: PhantomData,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Current version list, for feeding `VersionManager::sync`.
    pub async fn load(&self) -> AppResult<Vec<Version<T>>> {
        version_store::list(&self.pool, T::KIND, &self.entity_id).await
    }

    /// Version to reopen, falling back to main when the remembered one is gone.
    pub async fn remembered_version_id(&self) -> AppResult<Option<String>> {
        version_selection::resolve_selected_version(
            &self.pool,
            &self.selection,
            T::KIND,
            &self.entity_id,
        )
        .await
    }

    async fn ensure_owned(&self, version_id: &str) -> AppResult<()> {
        match version_store::owner_of(&self.pool, T::KIND, version_id).await? {
            Some(owner) if owner == self.entity_id => Ok(()),
            _ => Err(version_not_found(version_id)),
        }
    }
}

#[async_trait]
impl<T: EntitySnapshot> VersionHandlers<T> for SqliteVersionHandlers<T> {
    async fn change(&self, version_id: &str, _version: &Version<T>) -> AppResult<()> {
        self.ensure_owned(version_id).await?;
        version_selection::remember_version(&self.selection, T::KIND, &self.entity_id, version_id)
    }

    async fn create(&self, data: &CreateVersionData, entity_data: &T) -> AppResult<Version<T>> {
        let created =
            version_store::create(&self.pool, T::KIND, &self.entity_id, data, entity_data).await?;
        // The manager opens the new version, so reopening should too.
        version_selection::remember_version(&self.selection, T::KIND, &self.entity_id, &created.id)?;
        Ok(created)
    }

    async fn update(&self, version_id: &str, data: &UpdateVersionData) -> AppResult<()> {
        self.ensure_owned(version_id).await?;
        version_store::update(&self.pool, T::KIND, version_id, data).await
    }

    async fn delete(&self, version_id: &str) -> AppResult<()> {
        self.ensure_owned(version_id).await?;
        version_store::delete(&self.pool, T::KIND, version_id).await?;
        if self.selection.snapshot(T::KIND, &self.entity_id).as_deref() == Some(version_id) {
            version_selection::forget_version(&self.selection, T::KIND, &self.entity_id);
        }
        Ok(())
    }

    async fn activate(&self, version_id: &str) -> AppResult<()> {
        self.ensure_owned(version_id).await?;
        version_store::activate(&self.pool, T::KIND, version_id).await
    }
}
