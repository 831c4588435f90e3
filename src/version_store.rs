//! SQLite persistence for entity versions.
//!
//! Every function takes the [`EntityKind`] explicitly; table and column names
//! come from the kind, never from callers.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use thiserror::Error;

use crate::{
    entity_kind::EntityKind,
    id::new_uuid_v7,
    model_versions::{
        main_version_protected, validate_create, validate_update, version_not_found,
        CreateVersionData, UpdateVersionData, Version, VERSIONS_DECODE_ERROR,
        VERSIONS_PERSIST_FAILED,
    },
    time::now_ms,
    AppError, AppResult,
};

#[derive(Error, Debug)]
pub enum VersionGuardError {
    #[error("version not found")]
    NotFound,
    #[error("main version cannot be deleted")]
    MainProtected,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl VersionGuardError {
    fn into_app_error(self, version_id: &str, operation: &'static str) -> AppError {
        match self {
            VersionGuardError::NotFound => version_not_found(version_id),
            VersionGuardError::MainProtected => main_version_protected(version_id),
            VersionGuardError::Database(err) => wrap_unexpected(err.into(), operation),
        }
    }
}

fn wrap_unexpected(err: AppError, operation: &'static str) -> AppError {
    AppError::new(VERSIONS_PERSIST_FAILED, "Could not save version changes.")
        .with_context("operation", operation)
        .with_cause(err)
}

fn select_columns(kind: EntityKind) -> String {
    format!(
        "id, name, description, is_main, {data} AS entity_data, created_at, updated_at",
        data = kind.data_column(),
    )
}

fn deserialize_version<T: DeserializeOwned>(row: SqliteRow) -> AppResult<Version<T>> {
    let id: String = row.try_get("id")?;
    let raw: Option<String> = row.try_get("entity_data")?;
    let entity_data = serde_json::from_str(raw.as_deref().unwrap_or("{}")).map_err(|err| {
        AppError::new(VERSIONS_DECODE_ERROR, "Stored version data could not be read.")
            .with_context("version_id", id.clone())
            .with_cause(AppError::from(err))
    })?;
    let is_main: i64 = row.try_get("is_main")?;

    Ok(Version {
        id,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_main: is_main != 0,
        entity_data,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Versions of one entity, main first, then oldest first.
pub async fn list<T: DeserializeOwned>(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: &str,
) -> AppResult<Vec<Version<T>>> {
    let sql = format!(
        "SELECT {cols} FROM {table} WHERE {owner} = ? ORDER BY is_main DESC, created_at ASC, id ASC",
        cols = select_columns(kind),
        table = kind.versions_table(),
        owner = kind.owner_column(),
    );
    let rows = sqlx::query(&sql)
        .bind(entity_id)
        .fetch_all(pool)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_list"))?;

    rows.into_iter().map(deserialize_version).collect()
}

pub async fn get<T: DeserializeOwned>(
    pool: &SqlitePool,
    kind: EntityKind,
    version_id: &str,
) -> AppResult<Option<Version<T>>> {
    let sql = format!(
        "SELECT {cols} FROM {table} WHERE id = ?",
        cols = select_columns(kind),
        table = kind.versions_table(),
    );
    let row = sqlx::query(&sql)
        .bind(version_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_get"))?;

    row.map(deserialize_version).transpose()
}

/// Entity id a version belongs to.
pub async fn owner_of(
    pool: &SqlitePool,
    kind: EntityKind,
    version_id: &str,
) -> AppResult<Option<String>> {
    let sql = format!(
        "SELECT {owner} FROM {table} WHERE id = ?",
        owner = kind.owner_column(),
        table = kind.versions_table(),
    );
    sqlx::query_scalar(&sql)
        .bind(version_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_owner"))
}

/// Inserts a new version. The first version of an entity becomes its main one.
pub async fn create<T: Serialize + Clone>(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: &str,
    data: &CreateVersionData,
    snapshot: &T,
) -> AppResult<Version<T>> {
    validate_create(data)?;
    let encoded = serde_json::to_string(snapshot)?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_create"))?;

    let has_main_sql = format!(
        "SELECT 1 FROM {table} WHERE {owner} = ? AND is_main = 1",
        table = kind.versions_table(),
        owner = kind.owner_column(),
    );
    let has_main: Option<i64> = sqlx::query_scalar(&has_main_sql)
        .bind(entity_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_create"))?;

    let version = Version {
        id: new_uuid_v7(),
        name: data.name.trim().to_string(),
        description: data.description.clone(),
        is_main: has_main.is_none(),
        entity_data: snapshot.clone(),
        created_at: now_ms(),
        updated_at: None,
    };

    let insert_sql = format!(
        "INSERT INTO {table} (id, {owner}, name, description, is_main, {data}, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        table = kind.versions_table(),
        owner = kind.owner_column(),
        data = kind.data_column(),
    );
    sqlx::query(&insert_sql)
        .bind(&version.id)
        .bind(entity_id)
        .bind(&version.name)
        .bind(&version.description)
        .bind(if version.is_main { 1_i64 } else { 0_i64 })
        .bind(&encoded)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_create"))?;

    tx.commit()
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_create"))?;
    Ok(version)
}

/// Partial rename/redescribe. Absent fields keep their stored value.
pub async fn update(
    pool: &SqlitePool,
    kind: EntityKind,
    version_id: &str,
    data: &UpdateVersionData,
) -> AppResult<()> {
    validate_update(data)?;
    let sql = format!(
        "UPDATE {table} SET name = COALESCE(?, name), description = COALESCE(?, description), \
         updated_at = ? WHERE id = ?",
        table = kind.versions_table(),
    );
    let res = sqlx::query(&sql)
        .bind(data.name.as_deref().map(str::trim))
        .bind(data.description.as_deref())
        .bind(now_ms())
        .bind(version_id)
        .execute(pool)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_update"))?;
    if res.rows_affected() == 0 {
        return Err(version_not_found(version_id));
    }
    Ok(())
}

async fn assert_deletable(
    pool: &SqlitePool,
    kind: EntityKind,
    version_id: &str,
) -> Result<(), VersionGuardError> {
    let sql = format!(
        "SELECT is_main FROM {table} WHERE id = ?",
        table = kind.versions_table()
    );
    let is_main: Option<i64> = sqlx::query_scalar(&sql)
        .bind(version_id)
        .fetch_optional(pool)
        .await?;
    match is_main {
        None => Err(VersionGuardError::NotFound),
        Some(flag) if flag != 0 => Err(VersionGuardError::MainProtected),
        Some(_) => Ok(()),
    }
}

pub async fn delete(pool: &SqlitePool, kind: EntityKind, version_id: &str) -> AppResult<()> {
    assert_deletable(pool, kind, version_id)
        .await
        .map_err(|err| err.into_app_error(version_id, "versions_delete"))?;

    let sql = format!(
        "DELETE FROM {table} WHERE id = ? AND is_main = 0",
        table = kind.versions_table()
    );
    let res = sqlx::query(&sql)
        .bind(version_id)
        .execute(pool)
        .await
        .map_err(|err| wrap_unexpected(err.into(), "versions_delete"))?;
    if res.rows_affected() == 0 {
        // Promoted or removed between the guard and the delete.
        return Err(version_not_found(version_id));
    }
    Ok(())
}

async fn activate_in_tx(
    pool: &SqlitePool,
    kind: EntityKind,
    version_id: &str,
) -> Result<(), VersionGuardError> {
    let table = kind.versions_table();
    let owner = kind.owner_column();
    let mut tx = pool.begin().await?;

    let owner_sql = format!("SELECT {owner} FROM {table} WHERE id = ?");
    let entity_id: Option<String> = sqlx::query_scalar(&owner_sql)
        .bind(version_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(entity_id) = entity_id else {
        return Err(VersionGuardError::NotFound);
    };

    let now = now_ms();
    // Demote first so the partial unique index never sees two mains.
    let demote_sql = format!(
        "UPDATE {table} SET is_main = 0, updated_at = ? WHERE {owner} = ? AND is_main = 1 AND id <> ?"
    );
    sqlx::query(&demote_sql)
        .bind(now)
        .bind(&entity_id)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

    let promote_sql = format!("UPDATE {table} SET is_main = 1, updated_at = ? WHERE id = ?");
    sqlx::query(&promote_sql)
        .bind(now)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Makes `version_id` the main version of its entity, demoting the previous one.
pub async fn activate(pool: &SqlitePool, kind: EntityKind, version_id: &str) -> AppResult<()> {
    activate_in_tx(pool, kind, version_id)
        .await
        .map_err(|err| err.into_app_error(version_id, "versions_activate"))
}
