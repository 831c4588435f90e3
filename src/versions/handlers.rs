use async_trait::async_trait;

use crate::{
    model_versions::{CreateVersionData, UpdateVersionData, Version, VERSIONS_PERSIST_FAILED},
    AppError, AppResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionOp {
    Change,
    Create,
    Update,
    Delete,
    Activate,
}

impl VersionOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            VersionOp::Change => "change",
            VersionOp::Create => "create",
            VersionOp::Update => "update",
            VersionOp::Delete => "delete",
            VersionOp::Activate => "activate",
        }
    }
}

/// Persistence collaborator for one entity's versions.
///
/// The manager calls `supports` before anything else; an unsupported
/// operation is skipped and logged, never reported to the user.
#[async_trait]
pub trait VersionHandlers<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    fn supports(&self, _op: VersionOp) -> bool {
        true
    }

    async fn change(&self, version_id: &str, version: &Version<T>) -> AppResult<()>;

    async fn create(&self, data: &CreateVersionData, entity_data: &T) -> AppResult<Version<T>>;

    async fn update(&self, version_id: &str, data: &UpdateVersionData) -> AppResult<()>;

    async fn delete(&self, version_id: &str) -> AppResult<()>;

    /// Promotes `version_id` to main and demotes the previous main.
    async fn activate(&self, version_id: &str) -> AppResult<()>;
}

/// Handlers for a host that has not wired persistence yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

fn handler_missing(op: VersionOp) -> AppError {
    AppError::new(VERSIONS_PERSIST_FAILED, "No version handler configured.")
        .with_context("operation", op.as_str())
}

#[async_trait]
impl<T> VersionHandlers<T> for Unconfigured
where
    T: Send + Sync + 'static,
{
    fn supports(&self, _op: VersionOp) -> bool {
        false
    }

    async fn change(&self, _version_id: &str, _version: &Version<T>) -> AppResult<()> {
        Err(handler_missing(VersionOp::Change))
    }

    async fn create(&self, _data: &CreateVersionData, _entity_data: &T) -> AppResult<Version<T>> {
        Err(handler_missing(VersionOp::Create))
    }

    async fn update(&self, _version_id: &str, _data: &UpdateVersionData) -> AppResult<()> {
        Err(handler_missing(VersionOp::Update))
    }

    async fn delete(&self, _version_id: &str) -> AppResult<()> {
        Err(handler_missing(VersionOp::Delete))
    }

    async fn activate(&self, _version_id: &str) -> AppResult<()> {
        Err(handler_missing(VersionOp::Activate))
    }
}
