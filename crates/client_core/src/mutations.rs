//! Create/update/delete sequencing around the duty list.
//!
//! Every operation settles into a [`ListEffect`] that is applied in one place, so a mutation
//! re-syncs the list at most once.

use std::sync::Arc;

use shared::{
    domain::{Duty, DutyDraft, DutyId},
    error::ValidationError,
    validation::DutyInput,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{MutationError, RequestError},
    orchestrator::ListOrchestrator,
    DutiesApi, Notifier,
};

/// Field rules applied to a draft before it is sent anywhere.
pub trait DraftValidator: Send + Sync {
    fn validate(&self, draft: &DutyDraft) -> Result<DutyInput, ValidationError>;
}

/// The default duty name rules: trimmed, non-empty, at most 255 characters.
pub struct NameRules;

impl DraftValidator for NameRules {
    fn validate(&self, draft: &DutyDraft) -> Result<DutyInput, ValidationError> {
        draft.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Editor {
    #[default]
    Closed,
    Create,
    Edit(Duty),
}

impl Editor {
    pub fn is_open(&self) -> bool {
        !matches!(self, Editor::Closed)
    }

    pub fn target(&self) -> Option<DutyId> {
        match self {
            Editor::Edit(duty) => Some(duty.id),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Editor::Edit(_) => "Edit Duty",
            _ => "Create Duty",
        }
    }

    pub fn confirm_label(&self) -> &'static str {
        match self {
            Editor::Edit(_) => "Update",
            _ => "Create",
        }
    }

    pub fn initial_draft(&self) -> DutyDraft {
        match self {
            Editor::Edit(duty) => DutyDraft::from(duty),
            _ => DutyDraft::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    fn success_message(self) -> &'static str {
        match self {
            MutationKind::Create => "Duty created",
            MutationKind::Update => "Duty updated",
            MutationKind::Delete => "Duty deleted",
        }
    }

    fn failure_fallback(self) -> &'static str {
        match self {
            MutationKind::Create | MutationKind::Update => "Operation failed",
            MutationKind::Delete => "Delete failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStatus {
    pub in_flight: usize,
    pub last_error: Option<String>,
}

impl OperationStatus {
    pub fn submitting(&self) -> bool {
        self.in_flight > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationStatus {
    pub create: OperationStatus,
    pub update: OperationStatus,
    pub delete: OperationStatus,
}

impl MutationStatus {
    pub fn get(&self, kind: MutationKind) -> &OperationStatus {
        match kind {
            MutationKind::Create => &self.create,
            MutationKind::Update => &self.update,
            MutationKind::Delete => &self.delete,
        }
    }

    fn get_mut(&mut self, kind: MutationKind) -> &mut OperationStatus {
        match kind {
            MutationKind::Create => &mut self.create,
            MutationKind::Update => &mut self.update,
            MutationKind::Delete => &mut self.delete,
        }
    }

    pub fn any_submitting(&self) -> bool {
        self.create.submitting() || self.update.submitting() || self.delete.submitting()
    }
}

/// What happened to the list once a mutation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEffect {
    Reload,
    Keep,
}

#[derive(Debug)]
pub struct MutationOutcome<T> {
    pub result: Result<T, MutationError>,
    pub effect: ListEffect,
}

impl<T> MutationOutcome<T> {
    fn kept(error: impl Into<MutationError>) -> Self {
        Self {
            result: Err(error.into()),
            effect: ListEffect::Keep,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, MutationError> {
        self.result
    }
}

/// Holds one in-flight slot for `kind` until dropped.
struct InFlight<'a> {
    status: &'a watch::Sender<MutationStatus>,
    kind: MutationKind,
}

impl<'a> InFlight<'a> {
    fn acquire(status: &'a watch::Sender<MutationStatus>, kind: MutationKind) -> Self {
        status.send_modify(|status| {
            let op = status.get_mut(kind);
            op.in_flight += 1;
            op.last_error = None;
        });
        Self { status, kind }
    }

    fn fail(&self, message: &str) {
        self.status.send_modify(|status| {
            status.get_mut(self.kind).last_error = Some(message.to_string());
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let kind = self.kind;
        self.status.send_modify(|status| {
            let op = status.get_mut(kind);
            op.in_flight = op.in_flight.saturating_sub(1);
        });
    }
}

pub struct MutationCoordinator {
    api: Arc<dyn DutiesApi>,
    list: Arc<ListOrchestrator>,
    notifier: Arc<dyn Notifier>,
    validator: Arc<dyn DraftValidator>,
    editor: watch::Sender<Editor>,
    status: watch::Sender<MutationStatus>,
}

impl MutationCoordinator {
    pub fn new(
        api: Arc<dyn DutiesApi>,
        list: Arc<ListOrchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_validator(api, list, notifier, Arc::new(NameRules))
    }

    pub fn with_validator(
        api: Arc<dyn DutiesApi>,
        list: Arc<ListOrchestrator>,
        notifier: Arc<dyn Notifier>,
        validator: Arc<dyn DraftValidator>,
    ) -> Self {
        let (editor, _) = watch::channel(Editor::Closed);
        let (status, _) = watch::channel(MutationStatus::default());
        Self {
            api,
            list,
            notifier,
            validator,
            editor,
            status,
        }
    }

    pub fn editor(&self) -> Editor {
        self.editor.borrow().clone()
    }

    pub fn subscribe_editor(&self) -> watch::Receiver<Editor> {
        self.editor.subscribe()
    }

    pub fn status(&self) -> MutationStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MutationStatus> {
        self.status.subscribe()
    }

    pub fn submitting(&self, kind: MutationKind) -> bool {
        self.status.borrow().get(kind).submitting()
    }

    pub fn open_create(&self) {
        self.editor.send_replace(Editor::Create);
    }

    pub fn open_edit(&self, duty: Duty) {
        self.editor.send_replace(Editor::Edit(duty));
    }

    pub fn close_editor(&self) {
        self.editor.send_replace(Editor::Closed);
    }

    /// Saves the open editor: an edit target means update, otherwise create.
    pub async fn submit(&self, draft: &DutyDraft) -> MutationOutcome<Duty> {
        match self.editor() {
            Editor::Closed => MutationOutcome::kept(MutationError::EditorClosed),
            Editor::Create => self.create(draft).await,
            Editor::Edit(duty) => self.update(duty.id, draft).await,
        }
    }

    pub async fn create(&self, draft: &DutyDraft) -> MutationOutcome<Duty> {
        let in_flight = InFlight::acquire(&self.status, MutationKind::Create);
        let input = match self.validator.validate(draft) {
            Ok(input) => input,
            Err(error) => return Self::rejected(&in_flight, error),
        };

        let result = self.api.create_duty(&input.name).await;
        self.finish_save(in_flight, result).await
    }

    pub async fn update(&self, id: DutyId, draft: &DutyDraft) -> MutationOutcome<Duty> {
        let in_flight = InFlight::acquire(&self.status, MutationKind::Update);
        let input = match self.validator.validate(draft) {
            Ok(input) => input,
            Err(error) => return Self::rejected(&in_flight, error),
        };

        let result = self.api.update_duty(id, &input.name).await;
        self.finish_save(in_flight, result).await
    }

    /// Deletes `id` and re-syncs the list once, whether or not the server accepted it.
    pub async fn delete(&self, id: DutyId) -> MutationOutcome<()> {
        let in_flight = InFlight::acquire(&self.status, MutationKind::Delete);
        let result = self.api.delete_duty(id).await;
        match &result {
            Ok(()) => {
                info!(duty_id = %id, "duty deleted");
                self.notifier.success(MutationKind::Delete.success_message());
            }
            Err(error) => self.report_failure(&in_flight, error),
        }

        self.apply(ListEffect::Reload).await;
        MutationOutcome {
            result: result.map_err(MutationError::from),
            effect: ListEffect::Reload,
        }
    }

    fn rejected(in_flight: &InFlight<'_>, error: ValidationError) -> MutationOutcome<Duty> {
        debug!(kind = ?in_flight.kind, %error, "draft rejected");
        in_flight.fail(&error.to_string());
        MutationOutcome::kept(error)
    }

    async fn finish_save(
        &self,
        in_flight: InFlight<'_>,
        result: Result<Duty, RequestError>,
    ) -> MutationOutcome<Duty> {
        let kind = in_flight.kind;
        let effect = match &result {
            Ok(duty) => {
                info!(?kind, duty_id = %duty.id, "duty saved");
                self.close_editor();
                self.notifier.success(kind.success_message());
                ListEffect::Reload
            }
            Err(error) => {
                self.report_failure(&in_flight, error);
                ListEffect::Keep
            }
        };

        self.apply(effect).await;
        drop(in_flight);
        MutationOutcome {
            result: result.map_err(MutationError::from),
            effect,
        }
    }

    fn report_failure(&self, in_flight: &InFlight<'_>, error: &RequestError) {
        let message = error.describe(in_flight.kind.failure_fallback());
        warn!(kind = ?in_flight.kind, %error, "duty mutation failed");
        in_flight.fail(&message);
        self.notifier.error(&message);
    }

    async fn apply(&self, effect: ListEffect) {
        if effect == ListEffect::Reload {
            self.list.reload().await;
        }
    }
}

#[cfg(test)]
#[path = "tests/mutations_tests.rs"]
mod tests;
