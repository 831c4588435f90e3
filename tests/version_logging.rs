#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex as StdMutex};

use serde_json::{json, Value};
use tracing::subscriber::{self, DefaultGuard};
use tracing_subscriber::{fmt, EnvFilter};

use grimorium_lib::{
    entities::FactionSnapshot,
    entity_kind::EntityKind,
    model_versions::{CreateVersionData, VERSIONS_MAIN_PROTECTED},
    version_logging::LogScope,
    version_selection::StoreHandle,
    version_store,
    versions::{SqliteVersionHandlers, TracingFeedback},
    AppError, VersionManager,
};

#[path = "util.rs"]
mod util;

struct BufferWriter(Arc<StdMutex<Vec<u8>>>);

impl std::io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn init_buffer_subscriber() -> (Arc<StdMutex<Vec<u8>>>, DefaultGuard) {
    let buffer: Arc<StdMutex<Vec<u8>>> = Arc::new(StdMutex::new(Vec::new()));
    let writer = buffer.clone();
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("grimorium=debug"))
        .with_writer(move || BufferWriter(writer.clone()))
        .json()
        .finish();
    let guard = subscriber::set_default(subscriber);
    (buffer, guard)
}

fn log_lines(buffer: &Arc<StdMutex<Vec<u8>>>) -> Vec<Value> {
    let raw = String::from_utf8(buffer.lock().unwrap().clone()).expect("log utf8");
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json log line"))
        .collect()
}

fn for_cmd<'a>(lines: &'a [Value], cmd: &str) -> Vec<&'a Value> {
    lines
        .iter()
        .filter(|line| line["fields"]["cmd"] == cmd)
        .collect()
}

#[test]
fn scope_logs_enter_and_success() {
    let (buffer, _guard) = init_buffer_subscriber();

    let scope = LogScope::new("version_change", EntityKind::Character, "c-1");
    scope.success(Some("v-1"), json!({ "stage": "switched" }));

    let lines = log_lines(&buffer);
    let scoped = for_cmd(&lines, "version_change");
    assert_eq!(scoped.len(), 2);
    assert_eq!(scoped[0]["level"], "DEBUG");
    assert_eq!(scoped[1]["level"], "INFO");
    assert_eq!(scoped[1]["fields"]["entity_kind"], "character");
    assert_eq!(scoped[1]["fields"]["version_id"], "v-1");
    assert!(scoped[1]["fields"]["duration_ms"].is_u64());
    let details: Value =
        serde_json::from_str(scoped[1]["fields"]["details"].as_str().unwrap()).unwrap();
    assert_eq!(details["stage"], "switched");
}

#[test]
fn refused_requests_log_at_warn_and_store_failures_at_error() {
    let (buffer, _guard) = init_buffer_subscriber();

    let scope = LogScope::new("version_delete", EntityKind::Item, "i-1");
    scope.fail(
        Some("v-main"),
        &AppError::new(VERSIONS_MAIN_PROTECTED, "main").with_context("version_id", "v-main"),
    );
    scope.fail(
        Some("v-main"),
        &AppError::new("VERSIONS/PERSIST_FAILED", "disk full"),
    );

    let lines = log_lines(&buffer);
    let scoped = for_cmd(&lines, "version_delete");
    let levels: Vec<_> = scoped.iter().map(|l| l["level"].as_str().unwrap()).collect();
    assert_eq!(levels, vec!["DEBUG", "WARN", "ERROR"]);

    let details: Value =
        serde_json::from_str(scoped[1]["fields"]["details"].as_str().unwrap()).unwrap();
    assert_eq!(details["code"], VERSIONS_MAIN_PROTECTED);
    assert_eq!(details["context"]["version_id"], "v-main");
}

#[tokio::test]
async fn manager_operations_are_logged_with_entity_scope() {
    let (buffer, _guard) = init_buffer_subscriber();
    let pool = util::migrated_pool().await;
    let main = version_store::create(
        &pool,
        EntityKind::Faction,
        "f-1",
        &CreateVersionData {
            name: "Canon".into(),
            description: None,
        },
        &FactionSnapshot::default(),
    )
    .await
    .expect("create");

    let handlers = SqliteVersionHandlers::<FactionSnapshot>::new(
        pool.clone(),
        StoreHandle::in_memory(),
        "f-1",
    );
    let versions = handlers.load().await.expect("load");
    let mut manager = VersionManager::new(
        EntityKind::Faction,
        "f-1",
        handlers,
        TracingFeedback::default(),
    );
    manager.sync(versions, None);
    manager.delete_version(&main.id).await;

    let lines = log_lines(&buffer);
    let scoped = for_cmd(&lines, "version_delete");
    assert!(scoped
        .iter()
        .any(|l| l["level"] == "WARN" && l["fields"]["entity_id"] == "f-1"));
    assert!(lines.iter().any(|l| l["fields"]["event"] == "version_notice"
        && l["fields"]["code"] == VERSIONS_MAIN_PROTECTED));
}
