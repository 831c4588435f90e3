use anyhow::{Context, Result as AnyResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::path::Path;

/// Open (creating if needed) the app database and apply the connection pragmas.
pub async fn open_sqlite_pool(db_path: &Path) -> AnyResult<Pool<Sqlite>> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            tracing::error!(
                target: "grimorium",
                error = %e,
                event = "db_dir_create_failed",
                path = %parent.display()
            );
            e
        })?;
    }
    tracing::info!(target: "grimorium", event = "db_path", path = %db_path.display());

    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .log_statements(log::LevelFilter::Off);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000;")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA wal_autocheckpoint = 1000;")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .connect_with(opts)
        .await
        .with_context(|| format!("open sqlite database at {}", db_path.display()))?;

    log_effective_pragmas(&pool).await;

    Ok(pool)
}

/// Connection settings as SQLite reports them after open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePragmas {
    pub sqlite_version: String,
    pub journal_mode: String,
    pub foreign_keys: bool,
    pub busy_timeout_ms: i64,
}

async fn pragma_text(pool: &Pool<Sqlite>, sql: &str) -> String {
    sqlx::query_scalar::<_, String>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|_| String::from("unknown"))
}

async fn pragma_int(pool: &Pool<Sqlite>, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or(-1)
}

pub async fn effective_pragmas(pool: &Pool<Sqlite>) -> EffectivePragmas {
    EffectivePragmas {
        sqlite_version: pragma_text(pool, "SELECT sqlite_version()").await,
        journal_mode: pragma_text(pool, "PRAGMA journal_mode").await,
        foreign_keys: pragma_int(pool, "PRAGMA foreign_keys").await == 1,
        busy_timeout_ms: pragma_int(pool, "PRAGMA busy_timeout").await,
    }
}

async fn log_effective_pragmas(pool: &Pool<Sqlite>) {
    let pragmas = effective_pragmas(pool).await;
    tracing::info!(
        target: "grimorium",
        event = "db_open",
        sqlite_version = %pragmas.sqlite_version,
        journal_mode = %pragmas.journal_mode,
        foreign_keys = pragmas.foreign_keys,
        busy_timeout_ms = pragmas.busy_timeout_ms
    );
    if !pragmas.journal_mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(
            target: "grimorium",
            event = "db_open_warning",
            journal_mode = %pragmas.journal_mode,
            "version edits are not crash safe without WAL"
        );
    }
}
