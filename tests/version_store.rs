#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use serde_json::{json, Value};

use grimorium_lib::{
    entities::{CharacterSnapshot, RegionSnapshot},
    entity_kind::EntityKind,
    model_versions::{CreateVersionData, UpdateVersionData, Version, VERSIONS_INVALID_NAME},
    version_store,
};

#[path = "util.rs"]
mod util;

fn named(name: &str, description: Option<&str>) -> CreateVersionData {
    CreateVersionData {
        name: name.into(),
        description: description.map(str::to_string),
    }
}

async fn main_count(pool: &sqlx::SqlitePool, kind: EntityKind, entity_id: &str) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ? AND is_main = 1",
        kind.versions_table(),
        kind.owner_column()
    );
    Ok(sqlx::query_scalar(&sql)
        .bind(entity_id)
        .fetch_one(pool)
        .await?)
}

#[tokio::test]
async fn first_version_becomes_main_and_lists_first() -> Result<()> {
    let pool = util::migrated_pool().await;
    let snapshot = CharacterSnapshot {
        name: "Aria".into(),
        ..Default::default()
    };

    let main = version_store::create(
        &pool,
        EntityKind::Character,
        "c-1",
        &named("  Canon  ", Some("as published")),
        &snapshot,
    )
    .await?;
    let alt = version_store::create(
        &pool,
        EntityKind::Character,
        "c-1",
        &named("Exile", None),
        &snapshot,
    )
    .await?;

    assert!(main.is_main);
    assert_eq!(main.name, "Canon");
    assert!(!alt.is_main);

    let listed: Vec<Version<CharacterSnapshot>> =
        version_store::list(&pool, EntityKind::Character, "c-1").await?;
    let ids: Vec<_> = listed.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![main.id.as_str(), alt.id.as_str()]);
    assert_eq!(listed[0].entity_data, snapshot);
    assert_eq!(listed[0].description.as_deref(), Some("as published"));
    Ok(())
}

#[tokio::test]
async fn activate_swaps_main_within_one_entity() -> Result<()> {
    let pool = util::migrated_pool().await;
    let kind = EntityKind::Region;
    let data = RegionSnapshot::default();

    let first = version_store::create(&pool, kind, "r-1", &named("A", None), &data).await?;
    let second = version_store::create(&pool, kind, "r-1", &named("B", None), &data).await?;
    let other = version_store::create(&pool, kind, "r-2", &named("Other", None), &data).await?;

    version_store::activate(&pool, kind, &second.id).await?;

    let listed: Vec<Version<RegionSnapshot>> = version_store::list(&pool, kind, "r-1").await?;
    assert_eq!(listed[0].id, second.id);
    assert!(listed[0].is_main);
    assert_eq!(listed[1].id, first.id);
    assert!(!listed[1].is_main);
    assert!(listed[1].updated_at.is_some());
    assert_eq!(main_count(&pool, kind, "r-1").await?, 1);

    let untouched: Option<Version<RegionSnapshot>> =
        version_store::get(&pool, kind, &other.id).await?;
    assert!(untouched.expect("other entity version").is_main);

    // Re-activating the main version is harmless.
    version_store::activate(&pool, kind, &second.id).await?;
    assert_eq!(main_count(&pool, kind, "r-1").await?, 1);
    Ok(())
}

#[tokio::test]
async fn former_main_can_be_deleted_after_activation() -> Result<()> {
    let pool = util::migrated_pool().await;
    let kind = EntityKind::Faction;

    let first = version_store::create(&pool, kind, "f-1", &named("A", None), &json!({})).await?;
    let second = version_store::create(&pool, kind, "f-1", &named("B", None), &json!({})).await?;

    assert!(version_store::delete(&pool, kind, &first.id).await.is_err());
    version_store::activate(&pool, kind, &second.id).await?;
    version_store::delete(&pool, kind, &first.id).await?;

    let listed: Vec<Version<Value>> = version_store::list(&pool, kind, "f-1").await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, second.id);
    Ok(())
}

#[tokio::test]
async fn update_is_partial() -> Result<()> {
    let pool = util::migrated_pool().await;
    let kind = EntityKind::Item;
    let created = version_store::create(
        &pool,
        kind,
        "i-1",
        &named("Sword", Some("forged in the north")),
        &json!({ "name": "Sword" }),
    )
    .await?;

    version_store::update(
        &pool,
        kind,
        &created.id,
        &UpdateVersionData {
            name: Some("Blade".into()),
            description: None,
        },
    )
    .await?;

    let stored: Version<Value> = version_store::get(&pool, kind, &created.id)
        .await?
        .expect("stored version");
    assert_eq!(stored.name, "Blade");
    assert_eq!(stored.description.as_deref(), Some("forged in the north"));
    assert!(stored.updated_at.is_some());
    assert_eq!(stored.created_at, created.created_at);

    let err = version_store::update(
        &pool,
        kind,
        &created.id,
        &UpdateVersionData {
            name: Some("   ".into()),
            description: None,
        },
    )
    .await
    .expect_err("blank name");
    assert_eq!(err.code(), VERSIONS_INVALID_NAME);
    Ok(())
}

#[tokio::test]
async fn kinds_do_not_share_tables() -> Result<()> {
    let pool = util::migrated_pool().await;
    let created =
        version_store::create(&pool, EntityKind::Race, "same-id", &named("Elves", None), &json!({}))
            .await?;

    let races: Vec<Version<Value>> = version_store::list(&pool, EntityKind::Race, "same-id").await?;
    let items: Vec<Version<Value>> = version_store::list(&pool, EntityKind::Item, "same-id").await?;
    assert_eq!(races.len(), 1);
    assert!(items.is_empty());
    assert!(version_store::get::<Value>(&pool, EntityKind::Item, &created.id)
        .await?
        .is_none());
    assert_eq!(
        version_store::owner_of(&pool, EntityKind::Race, &created.id)
            .await?
            .as_deref(),
        Some("same-id")
    );
    Ok(())
}
