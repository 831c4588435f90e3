use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{AppError, AppResult};

pub const VERSIONS_NOT_FOUND: &str = "VERSIONS/NOT_FOUND";
pub const VERSIONS_MAIN_PROTECTED: &str = "VERSIONS/MAIN_PROTECTED";
pub const VERSIONS_INVALID_NAME: &str = "VERSIONS/INVALID_NAME";
pub const VERSIONS_INVALID_KIND: &str = "VERSIONS/INVALID_KIND";
pub const VERSIONS_DECODE_ERROR: &str = "VERSIONS/DECODE";
pub const VERSIONS_PERSIST_FAILED: &str = "VERSIONS/PERSIST_FAILED";

/// One named variant of an entity. `entity_data` is the snapshot of the
/// entity's editable fields captured when the version was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version<T> {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_main: bool,
    pub entity_data: T,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl<T> Version<T> {
    /// Applies a partial update. Fields absent from `update` keep their value.
    pub fn merge(&mut self, update: &UpdateVersionData) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateVersionData {
    pub name: String,
    #[serde(default)]
    #[ts(optional)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateVersionData {
    #[serde(default)]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub description: Option<String>,
}

pub fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::new(
            VERSIONS_INVALID_NAME,
            "Version names cannot be empty.",
        ));
    }
    Ok(())
}

pub fn validate_create(data: &CreateVersionData) -> AppResult<()> {
    validate_name(&data.name)
}

pub fn validate_update(data: &UpdateVersionData) -> AppResult<()> {
    match &data.name {
        Some(name) => validate_name(name),
        None => Ok(()),
    }
}

pub fn version_not_found(version_id: &str) -> AppError {
    AppError::new(VERSIONS_NOT_FOUND, "Version not found.")
        .with_context("version_id", version_id.to_string())
}

pub fn main_version_protected(version_id: &str) -> AppError {
    AppError::new(
        VERSIONS_MAIN_PROTECTED,
        "The main version cannot be deleted.",
    )
    .with_context("version_id", version_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Version<serde_json::Value> {
        Version {
            id: "b".into(),
            name: "Draft".into(),
            description: Some("before the war".into()),
            is_main: false,
            entity_data: json!({ "name": "Aria" }),
            created_at: 10,
            updated_at: None,
        }
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let mut version = sample();
        version.merge(&UpdateVersionData {
            name: Some("New".into()),
            description: None,
        });
        assert_eq!(version.name, "New");
        assert_eq!(version.description.as_deref(), Some("before the war"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let value = serde_json::to_value(sample()).expect("serialize version");
        assert_eq!(value["isMain"], json!(false));
        assert_eq!(value["entityData"]["name"], json!("Aria"));
        assert_eq!(value["createdAt"], json!(10));
        assert!(value.get("updatedAt").is_none());
    }

    #[test]
    fn blank_names_are_rejected() {
        let err = validate_create(&CreateVersionData {
            name: "   ".into(),
            description: None,
        })
        .expect_err("blank name");
        assert_eq!(err.code(), VERSIONS_INVALID_NAME);
        assert!(validate_update(&UpdateVersionData::default()).is_ok());
    }
}
