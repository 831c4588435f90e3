//! Tracks which version of an entity is being viewed and mediates every
//! change to that entity's version set.
//!
//! The manager never writes anything itself. Each operation asks the injected
//! [`VersionHandlers`] to persist, and only mirrors the result into memory once
//! the handler reports success. Failures are logged, turned into a
//! [`Notice`] for the user and returned as an [`Outcome`]; they never
//! propagate as errors.

use serde_json::json;
use tokio::sync::watch;
use tracing::warn;

use crate::{
    entity_kind::EntityKind,
    model_versions::{
        main_version_protected, validate_create, validate_update, version_not_found,
        CreateVersionData, UpdateVersionData, Version,
    },
    version_logging::LogScope,
    AppError,
};

mod feedback;
mod handlers;
pub mod sqlite;

pub use feedback::{
    Notice, NoticeLevel, TracingFeedback, UserFeedback, NOTICE_REQUESTED_VERSION_MISSING,
    NOTICE_VERSION_ACTIVATED, NOTICE_VERSION_CREATED, NOTICE_VERSION_DELETED,
    NOTICE_VERSION_UPDATED,
};
pub use handlers::{Unconfigured, VersionHandlers, VersionOp};
pub use sqlite::SqliteVersionHandlers;

/// Reactive output of the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionState<T> {
    pub current_version: Option<Version<T>>,
    pub is_changing_version: bool,
}

impl<T> Default for VersionState<T> {
    fn default() -> Self {
        Self {
            current_version: None,
            is_changing_version: false,
        }
    }
}

/// Result of one manager operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The handler succeeded and memory now mirrors it.
    Applied,
    /// Nothing to do; inputs were identical to the last sync.
    Unchanged,
    /// No handler is configured for this operation.
    Unconfigured,
    /// The user declined to discard unsaved changes.
    Cancelled,
    /// Refused before reaching the handler (unknown id, main version, bad name).
    Rejected(AppError),
    /// The handler reported a failure; memory was left at its prior value.
    Failed(AppError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            Outcome::Rejected(err) | Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

pub struct VersionManager<T, H, F> {
    entity_kind: EntityKind,
    entity_id: String,
    handlers: H,
    feedback: F,
    versions: Vec<Version<T>>,
    requested_id: Option<String>,
    has_unsaved_changes: bool,
    synced: bool,
    state: watch::Sender<VersionState<T>>,
}

impl<T, H, F> VersionManager<T, H, F>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    H: VersionHandlers<T>,
    F: UserFeedback,
{
    pub fn new(
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        handlers: H,
        feedback: F,
    ) -> Self {
        let (state, _rx) = watch::channel(VersionState::default());
        Self {
            entity_kind,
            entity_id: entity_id.into(),
            handlers,
            feedback,
            versions: Vec::new(),
            requested_id: None,
            has_unsaved_changes: false,
            synced: false,
            state,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn handlers(&self) -> &H {
        &self.handlers
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn versions(&self) -> &[Version<T>] {
        &self.versions
    }

    pub fn current_version(&self) -> Option<Version<T>> {
        self.state.borrow().current_version.clone()
    }

    pub fn current_version_id(&self) -> Option<String> {
        self.state
            .borrow()
            .current_version
            .as_ref()
            .map(|v| v.id.clone())
    }

    pub fn is_changing_version(&self) -> bool {
        self.state.borrow().is_changing_version
    }

    /// Receiver that observes `current_version` and `is_changing_version`.
    pub fn subscribe(&self) -> watch::Receiver<VersionState<T>> {
        self.state.subscribe()
    }

    pub fn set_unsaved_changes(&mut self, pending: bool) {
        self.has_unsaved_changes = pending;
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    fn find(&self, version_id: &str) -> Option<&Version<T>> {
        self.versions.iter().find(|v| v.id == version_id)
    }

    fn set_current(&self, next: Option<Version<T>>) {
        self.state.send_if_modified(|state| {
            if state.current_version == next {
                false
            } else {
                state.current_version = next;
                true
            }
        });
    }

    fn set_changing(&self, changing: bool) {
        self.state.send_if_modified(|state| {
            if state.is_changing_version == changing {
                false
            } else {
                state.is_changing_version = changing;
                true
            }
        });
    }

    /// Main version, or the first one when the list has no main at all.
    fn fallback_version(&self) -> Option<Version<T>> {
        if let Some(main) = self.versions.iter().find(|v| v.is_main) {
            return Some(main.clone());
        }
        let first = self.versions.first().cloned();
        if let Some(first) = &first {
            warn!(
                target: "grimorium",
                event = "version_main_missing",
                entity_kind = self.entity_kind.as_str(),
                entity_id = %self.entity_id,
                chosen_id = %first.id
            );
        }
        first
    }

    fn handler_missing(&self, op: VersionOp) -> Outcome {
        warn!(
            target: "grimorium",
            event = "version_handler_missing",
            entity_kind = self.entity_kind.as_str(),
            entity_id = %self.entity_id,
            operation = op.as_str()
        );
        Outcome::Unconfigured
    }

    fn refuse(&self, scope: &LogScope, version_id: Option<&str>, err: AppError) -> Outcome {
        scope.fail(version_id, &err);
        self.feedback.notify(Notice::from_error(&err));
        Outcome::Rejected(err)
    }

    fn report_failure(&self, scope: &LogScope, version_id: Option<&str>, err: AppError) -> Outcome {
        scope.fail(version_id, &err);
        self.feedback.notify(Notice::from_error(&err));
        Outcome::Failed(err)
    }

    /// Receives the host's version list and the externally requested id.
    ///
    /// The requested id wins when present in the list; an unknown requested id
    /// warns and falls back to main; no requested id selects main. Identical
    /// inputs are skipped, so the selection only resets when the list or the
    /// requested id actually changes.
    pub fn sync(&mut self, versions: Vec<Version<T>>, requested_id: Option<String>) -> Outcome {
        if self.synced && self.requested_id == requested_id && self.versions == versions {
            return Outcome::Unchanged;
        }
        self.versions = versions;
        self.requested_id = requested_id;
        self.synced = true;

        if self.versions.is_empty() {
            self.set_current(None);
            return Outcome::Applied;
        }

        let selected = match self.requested_id.clone() {
            Some(requested) => match self.find(&requested).cloned() {
                Some(found) => Some(found),
                None => {
                    warn!(
                        target: "grimorium",
                        event = "version_requested_not_found",
                        entity_kind = self.entity_kind.as_str(),
                        entity_id = %self.entity_id,
                        requested_id = %requested
                    );
                    self.feedback.notify(Notice::warning(
                        NOTICE_REQUESTED_VERSION_MISSING,
                        "That version no longer exists; showing the main version.",
                    ));
                    self.fallback_version()
                }
            },
            None => self.fallback_version(),
        };
        self.set_current(selected);
        Outcome::Applied
    }

    pub async fn change_version(&mut self, version_id: &str) -> Outcome {
        if !self.handlers.supports(VersionOp::Change) {
            return self.handler_missing(VersionOp::Change);
        }
        let scope = LogScope::new("version_change", self.entity_kind, self.entity_id.clone());

        let Some(target) = self.find(version_id).cloned() else {
            return self.refuse(&scope, Some(version_id), version_not_found(version_id));
        };

        if self.has_unsaved_changes && !self.feedback.confirm_discard_changes().await {
            scope.warn(Some(version_id), json!({ "reason": "unsaved_changes_kept" }));
            return Outcome::Cancelled;
        }

        let previous = self.current_version();
        self.set_changing(true);
        let result = self.handlers.change(version_id, &target).await;
        let outcome = match result {
            Ok(()) => {
                self.set_current(Some(target));
                scope.success(Some(version_id), json!({ "stage": "switched" }));
                Outcome::Applied
            }
            Err(err) => {
                self.set_current(previous);
                self.report_failure(&scope, Some(version_id), err)
            }
        };
        self.set_changing(false);
        outcome
    }

    pub async fn create_version(&mut self, data: CreateVersionData, entity_data: T) -> Outcome {
        if !self.handlers.supports(VersionOp::Create) {
            return self.handler_missing(VersionOp::Create);
        }
        let scope = LogScope::new("version_create", self.entity_kind, self.entity_id.clone());

        if let Err(err) = validate_create(&data) {
            return self.refuse(&scope, None, err);
        }

        match self.handlers.create(&data, &entity_data).await {
            Ok(created) => {
                match self.versions.iter_mut().find(|v| v.id == created.id) {
                    Some(existing) => *existing = created.clone(),
                    None => self.versions.push(created.clone()),
                }
                scope.success(Some(&created.id), json!({ "is_main": created.is_main }));
                self.set_current(Some(created));
                self.feedback
                    .notify(Notice::success(NOTICE_VERSION_CREATED, "Version created."));
                Outcome::Applied
            }
            Err(err) => self.report_failure(&scope, None, err),
        }
    }

    pub async fn update_version(&mut self, version_id: &str, data: UpdateVersionData) -> Outcome {
        if !self.handlers.supports(VersionOp::Update) {
            return self.handler_missing(VersionOp::Update);
        }
        let scope = LogScope::new("version_update", self.entity_kind, self.entity_id.clone());

        if let Err(err) = validate_update(&data) {
            return self.refuse(&scope, Some(version_id), err);
        }
        if self.find(version_id).is_none() {
            return self.refuse(&scope, Some(version_id), version_not_found(version_id));
        }

        match self.handlers.update(version_id, &data).await {
            Ok(()) => {
                if let Some(entry) = self.versions.iter_mut().find(|v| v.id == version_id) {
                    entry.merge(&data);
                }
                let merged_current = self
                    .current_version()
                    .filter(|current| current.id == version_id)
                    .map(|mut current| {
                        current.merge(&data);
                        current
                    });
                if let Some(current) = merged_current {
                    self.set_current(Some(current));
                }
                scope.success(
                    Some(version_id),
                    json!({
                        "name_changed": data.name.is_some(),
                        "description_changed": data.description.is_some()
                    }),
                );
                self.feedback
                    .notify(Notice::success(NOTICE_VERSION_UPDATED, "Version updated."));
                Outcome::Applied
            }
            Err(err) => self.report_failure(&scope, Some(version_id), err),
        }
    }

    pub async fn delete_version(&mut self, version_id: &str) -> Outcome {
        if !self.handlers.supports(VersionOp::Delete) {
            return self.handler_missing(VersionOp::Delete);
        }
        let scope = LogScope::new("version_delete", self.entity_kind, self.entity_id.clone());

        let Some(target) = self.find(version_id) else {
            return self.refuse(&scope, Some(version_id), version_not_found(version_id));
        };
        if target.is_main {
            return self.refuse(&scope, Some(version_id), main_version_protected(version_id));
        }

        match self.handlers.delete(version_id).await {
            Ok(()) => {
                self.versions.retain(|v| v.id != version_id);
                let was_current = self.current_version_id().as_deref() == Some(version_id);
                if was_current {
                    let fallback = self.fallback_version();
                    self.set_current(fallback);
                }
                scope.success(Some(version_id), json!({ "was_current": was_current }));
                self.feedback
                    .notify(Notice::success(NOTICE_VERSION_DELETED, "Version deleted."));
                Outcome::Applied
            }
            Err(err) => self.report_failure(&scope, Some(version_id), err),
        }
    }

    /// Promotes a version to main. The current selection is not switched.
    pub async fn activate_version(&mut self, version_id: &str) -> Outcome {
        if !self.handlers.supports(VersionOp::Activate) {
            return self.handler_missing(VersionOp::Activate);
        }
        let scope = LogScope::new("version_activate", self.entity_kind, self.entity_id.clone());

        if self.find(version_id).is_none() {
            return self.refuse(&scope, Some(version_id), version_not_found(version_id));
        }

        match self.handlers.activate(version_id).await {
            Ok(()) => {
                for version in &mut self.versions {
                    version.is_main = version.id == version_id;
                }
                let refreshed = self.current_version().map(|mut current| {
                    current.is_main = current.id == version_id;
                    current
                });
                self.set_current(refreshed);
                scope.success(Some(version_id), json!({ "stage": "promoted" }));
                self.feedback.notify(Notice::success(
                    NOTICE_VERSION_ACTIVATED,
                    "Version set as main.",
                ));
                Outcome::Applied
            }
            Err(err) => self.report_failure(&scope, Some(version_id), err),
        }
    }
}
