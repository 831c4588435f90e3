use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

use crate::{model_versions::VERSIONS_INVALID_KIND, AppError};

/// Entity kinds that support alternative versions.
///
/// Each kind owns its own version table so that the table and column names
/// used in SQL are drawn from this closed set and never from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Item,
    Race,
    Faction,
    Region,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Character,
        EntityKind::Item,
        EntityKind::Race,
        EntityKind::Faction,
        EntityKind::Region,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Item => "item",
            EntityKind::Race => "race",
            EntityKind::Faction => "faction",
            EntityKind::Region => "region",
        }
    }

    pub fn iter() -> impl Iterator<Item = EntityKind> {
        Self::ALL.into_iter()
    }

    pub const fn versions_table(self) -> &'static str {
        match self {
            EntityKind::Character => "character_versions",
            EntityKind::Item => "item_versions",
            EntityKind::Race => "race_versions",
            EntityKind::Faction => "faction_versions",
            EntityKind::Region => "region_versions",
        }
    }

    /// Column holding the id of the entity a version belongs to.
    pub const fn owner_column(self) -> &'static str {
        match self {
            EntityKind::Character => "character_id",
            EntityKind::Item => "item_id",
            EntityKind::Race => "race_id",
            EntityKind::Faction => "faction_id",
            EntityKind::Region => "region_id",
        }
    }

    /// Column holding the JSON snapshot.
    pub const fn data_column(self) -> &'static str {
        match self {
            EntityKind::Character => "character_data",
            EntityKind::Item => "item_data",
            EntityKind::Race => "race_data",
            EntityKind::Faction => "faction_data",
            EntityKind::Region => "region_data",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid entity kind: {value}")]
pub struct EntityKindError {
    value: String,
}

impl EntityKindError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl From<EntityKindError> for AppError {
    fn from(error: EntityKindError) -> Self {
        AppError::new(VERSIONS_INVALID_KIND, "Entity kind not recognised.")
            .with_context("kind", error.value)
    }
}

impl FromStr for EntityKind {
    type Err = EntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character" => Ok(EntityKind::Character),
            "item" => Ok(EntityKind::Item),
            "race" => Ok(EntityKind::Race),
            "faction" => Ok(EntityKind::Faction),
            "region" => Ok(EntityKind::Region),
            other => Err(EntityKindError::new(other)),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_display_name() {
        for kind in EntityKind::iter() {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_maps_to_app_error() {
        let err = "book".parse::<EntityKind>().expect_err("books are not versioned");
        assert_eq!(err.value(), "book");
        let app: AppError = err.into();
        assert_eq!(app.code(), VERSIONS_INVALID_KIND);
        assert_eq!(app.context().get("kind").map(String::as_str), Some("book"));
    }

    #[test]
    fn table_columns_follow_kind_name() {
        for kind in EntityKind::iter() {
            assert!(kind.versions_table().starts_with(kind.as_str()));
            assert!(kind.owner_column().starts_with(kind.as_str()));
            assert!(kind.data_column().starts_with(kind.as_str()));
        }
    }
}
