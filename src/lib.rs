//! Backend for Grimorium's entity versions: alternative takes on a
//! character, item, race, faction or region, with one main version each.

pub mod config;
pub mod db;
pub mod entities;
pub mod entity_kind;
pub mod error;
pub mod id;
pub mod logging;
pub mod migrate;
pub mod model_versions;
pub mod time;
pub mod version_logging;
pub mod version_selection;
pub mod version_store;
pub mod versions;

pub use error::{AppError, AppResult};
pub use versions::{Outcome, VersionManager, VersionState};
