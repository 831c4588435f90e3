use serde::{de::DeserializeOwned, Deserialize, Serialize};
use ts_rs::TS;

use crate::entity_kind::EntityKind;

/// Payload type stored in `Version::entity_data`.
///
/// Snapshots are stored as JSON, so every field defaults on decode and
/// unknown fields are ignored; rows written by older builds keep loading.
pub trait EntitySnapshot:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static
{
    const KIND: EntityKind;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct CharacterSnapshot {
    pub name: String,
    #[ts(optional)]
    pub age: Option<String>,
    #[ts(optional)]
    pub gender: Option<String>,
    #[ts(optional)]
    pub role: Option<String>,
    #[ts(optional)]
    pub description: Option<String>,
    #[ts(optional)]
    pub image: Option<String>,
    #[ts(optional)]
    pub alignment: Option<String>,
    #[ts(optional)]
    pub personality: Option<String>,
    #[ts(optional)]
    pub birth_place: Option<String>,
}

impl EntitySnapshot for CharacterSnapshot {
    const KIND: EntityKind = EntityKind::Character;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct ItemSnapshot {
    pub name: String,
    #[ts(optional)]
    pub status: Option<String>,
    #[ts(optional)]
    pub category: Option<String>,
    #[ts(optional)]
    pub basic_description: Option<String>,
    #[ts(optional)]
    pub image: Option<String>,
    #[ts(optional)]
    pub origin: Option<String>,
    #[ts(optional)]
    pub story_rarity: Option<String>,
}

impl EntitySnapshot for ItemSnapshot {
    const KIND: EntityKind = EntityKind::Item;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct RaceSnapshot {
    pub name: String,
    pub domain: Vec<String>,
    pub summary: String,
    #[ts(optional)]
    pub image: Option<String>,
    #[ts(optional)]
    pub scientific_name: Option<String>,
    #[ts(optional)]
    pub general_appearance: Option<String>,
    #[ts(optional)]
    pub life_expectancy: Option<String>,
}

impl EntitySnapshot for RaceSnapshot {
    const KIND: EntityKind = EntityKind::Race;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct FactionSnapshot {
    pub name: String,
    pub summary: String,
    pub status: String,
    pub faction_type: String,
    #[ts(optional)]
    pub image: Option<String>,
    #[ts(optional)]
    pub alignment: Option<String>,
    /// 1-10 scale.
    #[ts(optional)]
    pub military_power: Option<u8>,
    #[ts(optional)]
    pub political_power: Option<u8>,
}

impl EntitySnapshot for FactionSnapshot {
    const KIND: EntityKind = EntityKind::Faction;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct RegionSnapshot {
    pub name: String,
    #[ts(optional)]
    pub parent_id: Option<String>,
    #[ts(optional)]
    pub scale: Option<String>,
    #[ts(optional)]
    pub summary: Option<String>,
    #[ts(optional)]
    pub image: Option<String>,
    #[ts(optional)]
    pub climate: Option<String>,
}

impl EntitySnapshot for RegionSnapshot {
    const KIND: EntityKind = EntityKind::Region;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn old_snapshots_with_extra_and_missing_fields_decode() {
        let stored = json!({
            "name": "Aria",
            "role": "protagonist",
            "fieldVisibility": { "age": false }
        });
        let snapshot: CharacterSnapshot = serde_json::from_value(stored).expect("decode");
        assert_eq!(snapshot.name, "Aria");
        assert_eq!(snapshot.role.as_deref(), Some("protagonist"));
        assert!(snapshot.age.is_none());
    }

    #[test]
    fn faction_snapshot_uses_camel_case() {
        let snapshot = FactionSnapshot {
            name: "Ember Court".into(),
            faction_type: "kingdom".into(),
            military_power: Some(7),
            ..Default::default()
        };
        let value = serde_json::to_value(&snapshot).expect("encode");
        assert_eq!(value["factionType"], json!("kingdom"));
        assert_eq!(value["militaryPower"], json!(7));
    }
}
