use std::collections::HashMap;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::{entity_kind::EntityKind, AppError};

fn context_to_json(context: &HashMap<String, String>) -> Option<Value> {
    if context.is_empty() {
        None
    } else {
        let mut map = Map::with_capacity(context.len());
        for (key, value) in context {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Some(Value::Object(map))
    }
}

/// Codes that describe a refused request rather than a broken store.
pub fn is_validation_error(code: &str) -> bool {
    matches!(
        code,
        crate::model_versions::VERSIONS_NOT_FOUND
            | crate::model_versions::VERSIONS_MAIN_PROTECTED
            | crate::model_versions::VERSIONS_INVALID_NAME
            | crate::model_versions::VERSIONS_INVALID_KIND
    )
}

fn wrap_details(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "value": value })
    }
}

fn error_details(err: &AppError) -> Value {
    let mut map = Map::new();
    map.insert("code".into(), Value::String(err.code().to_string()));
    map.insert("message".into(), Value::String(err.message().to_string()));
    if let Some(context) = context_to_json(err.context()) {
        map.insert("context".into(), context);
    }
    if let Some(cause) = err.cause() {
        map.insert("cause".into(), Value::String(cause.to_string()));
    }
    Value::Object(map)
}

/// Timed log scope around one version operation on one entity.
pub struct LogScope {
    cmd: &'static str,
    entity_kind: EntityKind,
    entity_id: String,
    start: Instant,
}

impl LogScope {
    pub fn new(cmd: &'static str, entity_kind: EntityKind, entity_id: impl Into<String>) -> Self {
        let scope = Self {
            cmd,
            entity_kind,
            entity_id: entity_id.into(),
            start: Instant::now(),
        };
        debug!(
            target: "grimorium",
            area = "versions",
            cmd = scope.cmd,
            entity_kind = scope.entity_kind.as_str(),
            entity_id = scope.entity_id.as_str(),
            details = %json!({ "stage": "enter" })
        );
        scope
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn success(&self, version_id: Option<&str>, details: Value) {
        info!(
            target: "grimorium",
            area = "versions",
            cmd = self.cmd,
            entity_kind = self.entity_kind.as_str(),
            entity_id = self.entity_id.as_str(),
            version_id = version_id,
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn warn(&self, version_id: Option<&str>, details: Value) {
        warn!(
            target: "grimorium",
            area = "versions",
            cmd = self.cmd,
            entity_kind = self.entity_kind.as_str(),
            entity_id = self.entity_id.as_str(),
            version_id = version_id,
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn fail(&self, version_id: Option<&str>, err: &AppError) {
        if is_validation_error(err.code()) {
            self.warn(version_id, error_details(err));
            return;
        }

        error!(
            target: "grimorium",
            area = "versions",
            cmd = self.cmd,
            entity_kind = self.entity_kind.as_str(),
            entity_id = self.entity_id.as_str(),
            version_id = version_id,
            duration_ms = self.elapsed_ms(),
            details = %error_details(err)
        );
    }
}
