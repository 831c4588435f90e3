use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;

use grimorium_lib::{
    config::AppConfig,
    db,
    entities::{
        CharacterSnapshot, EntitySnapshot, FactionSnapshot, ItemSnapshot, RaceSnapshot,
        RegionSnapshot,
    },
    entity_kind::EntityKind,
    logging, migrate,
    model_versions::{CreateVersionData, UpdateVersionData, Version},
    version_selection::StoreHandle,
    versions::{SqliteVersionHandlers, TracingFeedback},
    Outcome, VersionManager,
};

#[derive(Parser)]
#[command(name = "versions", about = "Grimorium entity version maintenance")]
struct Cli {
    /// Optional explicit DB path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Optional explicit selection store path
    #[arg(long, value_name = "PATH")]
    selection: Option<PathBuf>,

    /// Entity kind: character, item, race, faction or region
    #[arg(long)]
    kind: EntityKind,

    /// Id of the entity whose versions are managed
    #[arg(long)]
    entity: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Clone)]
enum Cmd {
    /// List versions and show which one is selected
    List,
    /// Create a version from a JSON snapshot
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Entity snapshot as JSON
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Rename or redescribe a version
    Rename {
        #[arg(long)]
        version: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete an alternative version
    Delete {
        #[arg(long)]
        version: String,
    },
    /// Make a version the main one
    Activate {
        #[arg(long)]
        version: String,
    },
    /// Remember a version as the one to reopen
    Select {
        #[arg(long)]
        version: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Listing<T> {
    entity_kind: EntityKind,
    entity_id: String,
    current_version_id: Option<String>,
    versions: Vec<Version<T>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    logging::init_logging(&config.log_filter);

    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    let selection_path = cli
        .selection
        .clone()
        .unwrap_or_else(|| config.selection_path.clone());

    let pool = db::open_sqlite_pool(&db_path).await?;
    migrate::apply_migrations(&pool)
        .await
        .context("apply migrations")?;
    let selection = StoreHandle::json_file(&selection_path)?;

    let ok = match cli.kind {
        EntityKind::Character => run::<CharacterSnapshot>(&pool, &selection, &cli).await?,
        EntityKind::Item => run::<ItemSnapshot>(&pool, &selection, &cli).await?,
        EntityKind::Race => run::<RaceSnapshot>(&pool, &selection, &cli).await?,
        EntityKind::Faction => run::<FactionSnapshot>(&pool, &selection, &cli).await?,
        EntityKind::Region => run::<RegionSnapshot>(&pool, &selection, &cli).await?,
    };
    pool.close().await;

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run<T: EntitySnapshot>(pool: &SqlitePool, selection: &StoreHandle, cli: &Cli) -> Result<bool> {
    let handlers = SqliteVersionHandlers::<T>::new(pool.clone(), selection.clone(), &cli.entity);
    let versions = handlers.load().await?;
    let remembered = handlers.remembered_version_id().await?;

    let mut manager = VersionManager::new(T::KIND, &cli.entity, handlers, TracingFeedback::default());
    manager.sync(versions, remembered);

    let outcome = match cli.cmd.clone() {
        Cmd::List => Outcome::Applied,
        Cmd::Create {
            name,
            description,
            data,
        } => {
            let snapshot: T = serde_json::from_str(&data).context("parse --data snapshot")?;
            manager
                .create_version(CreateVersionData { name, description }, snapshot)
                .await
        }
        Cmd::Rename {
            version,
            name,
            description,
        } => {
            manager
                .update_version(&version, UpdateVersionData { name, description })
                .await
        }
        Cmd::Delete { version } => manager.delete_version(&version).await,
        Cmd::Activate { version } => manager.activate_version(&version).await,
        Cmd::Select { version } => manager.change_version(&version).await,
    };

    if let Some(err) = outcome.error() {
        eprintln!("{err}");
        return Ok(false);
    }

    let listing = Listing {
        entity_kind: T::KIND,
        entity_id: cli.entity.clone(),
        current_version_id: manager.current_version_id(),
        versions: manager.handlers().load().await?,
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(true)
}
