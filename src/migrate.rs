use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use std::collections::HashMap;

use crate::time::now_ms;
use tracing::{error, info};

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    if trimmed.chars().count() > 160 {
        let cut: String = trimmed.chars().take(160).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

static MIGRATIONS: &[(&str, &str)] = &[(
    "202510010900_entity_versions.sql",
    include_str!("../migrations/202510010900_entity_versions.sql"),
)];

fn strip_comments(raw_sql: &str) -> String {
    raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn checksum(cleaned: &str) -> String {
    format!("{:x}", Sha256::digest(cleaned.as_bytes()))
}

/// Names of the embedded migrations, in application order.
pub fn migration_names() -> impl Iterator<Item = &'static str> {
    MIGRATIONS.iter().map(|(name, _)| *name)
}

pub async fn apply_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version   TEXT PRIMARY KEY,\
           applied_at INTEGER NOT NULL,\
           checksum TEXT NOT NULL\
         )",
    )
    .await?;

    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    let mut applied: HashMap<String, String> = HashMap::new();
    for r in rows {
        if let (Ok(v), Ok(c)) = (
            r.try_get::<String, _>("version"),
            r.try_get::<String, _>("checksum"),
        ) {
            applied.insert(v, c);
        }
    }

    for (filename, raw_sql) in MIGRATIONS {
        let cleaned = strip_comments(raw_sql);
        let checksum = checksum(&cleaned);

        if let Some(stored) = applied.get(*filename) {
            if stored != &checksum {
                anyhow::bail!("migration {} edited after application", filename);
            }
            info!(target: "grimorium", event = "migration_skip_file", file = %filename);
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in cleaned.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            let upper = s.to_ascii_uppercase();
            if upper == "BEGIN" || upper == "COMMIT" {
                continue;
            }
            info!(target: "grimorium", event = "migration_stmt", file = %filename, sql = %preview(s));
            if let Err(e) = sqlx::query(s).execute(&mut *tx).await {
                error!(target: "grimorium", event = "migration_stmt_error", file = %filename, sql = %preview(s), error = %e);
                return Err(e.into());
            }
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?, ?, ?)",
        )
        .bind(*filename)
        .bind(now_ms())
        .bind(&checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(target: "grimorium", event = "migration_file_applied", file = %filename);
    }

    Ok(())
}
