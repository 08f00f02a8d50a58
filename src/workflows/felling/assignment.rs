//! Assignment manager: binds internal staff roles to users, closes out
//! prior holders, and runs the side effects tied to first-time admin officer
//! assignment.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::WorkflowConfig;

use super::domain::{
    active_assignee, current_status, ApplicationId, AssignedRole, CaseNote, CaseNoteType,
    FellingStatus, UserId,
};
use super::repository::{
    ApplicationRepository, ChangeSet, EntityMutation, PersistenceError, RepositoryError,
};
use super::transitions::{StatusTransitionManager, TransitionError};

/// What an assignment changed, so the caller can notify the displaced user
/// and detect a renumbered reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOutcome {
    pub original_reference: String,
    pub updated_reference: String,
    pub unassigned_user: Option<UserId>,
    pub already_assigned_to_this_user: bool,
}

/// Failures raised while assigning a role.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application has no status history")]
    NoStatusHistory,
    #[error("role {0} cannot be assigned to an internal user")]
    RoleNotAssignable(AssignedRole),
    #[error("no administrative area is configured for cost code {0}")]
    UnknownAreaCostCode(String),
    #[error("an area cost code is required when assigning {0}")]
    MissingAreaCostCode(AssignedRole),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Assigns internal staff roles, keeping at most one active holder per role
/// and folding triggered side effects into one commit.
pub struct AssignmentManager<R> {
    repository: Arc<R>,
    transitions: StatusTransitionManager<R>,
    config: Arc<WorkflowConfig>,
}

impl<R> AssignmentManager<R>
where
    R: ApplicationRepository,
{
    pub fn new(
        repository: Arc<R>,
        transitions: StatusTransitionManager<R>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            repository,
            transitions,
            config,
        }
    }

    /// Assign `role` to `assign_to`. Admin and woodland officer assignments
    /// update the application's area code from the configured areas; a
    /// first-time admin officer assignment while the application is still
    /// `Submitted` also moves it into `AdminOfficerReview`.
    #[allow(clippy::too_many_arguments)]
    pub fn assign_to_internal_user(
        &self,
        application_id: ApplicationId,
        assign_to: UserId,
        role: AssignedRole,
        performing_user: UserId,
        case_note_text: String,
        area_cost_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AssignmentOutcome, AssignmentError> {
        if !role.is_internal() {
            return Err(AssignmentError::RoleNotAssignable(role));
        }

        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(AssignmentError::ApplicationNotFound)?;
        let original_reference = application.reference.clone();

        let mut changes = ChangeSet::new(application_id);

        if matches!(
            role,
            AssignedRole::AdminOfficer | AssignedRole::WoodlandOfficer
        ) {
            let cost_code =
                area_cost_code.ok_or(AssignmentError::MissingAreaCostCode(role))?;
            let area = self
                .config
                .area_for_cost_code(cost_code)
                .ok_or_else(|| AssignmentError::UnknownAreaCostCode(cost_code.to_string()))?;
            changes.push(EntityMutation::UpdateAreaCode {
                area_code: area.to_string(),
            });
        }

        if role == AssignedRole::AdminOfficer {
            let history = self.repository.get_status_history(application_id)?;
            let current = current_status(&history)
                .ok_or(AssignmentError::NoStatusHistory)?
                .status;
            if current == FellingStatus::Submitted {
                changes.extend(self.transitions.plan_transition(
                    application_id,
                    &application.reference,
                    current,
                    FellingStatus::AdminOfficerReview,
                    now,
                )?);
            }
        }

        let assignees = self.repository.get_assignee_history(application_id)?;
        let previous = active_assignee(&assignees, role);
        let already_assigned_to_this_user =
            previous.is_some_and(|entry| entry.user == assign_to);
        let unassigned_user = previous
            .filter(|entry| entry.user != assign_to)
            .map(|entry| entry.user);

        if let Some(entry) = previous {
            changes.push(EntityMutation::CloseAssignee {
                role,
                user: entry.user,
                unassigned: now,
            });
        }
        changes.push(EntityMutation::AppendAssignee {
            role,
            user: assign_to,
            assigned: now,
        });

        changes.push(EntityMutation::AddCaseNote(CaseNote {
            application_id,
            note_type: CaseNoteType::CaseNote,
            text: case_note_text,
            visible_to_applicant: true,
            visible_to_consultee: false,
            created_by: performing_user,
            created_at: now,
        }));

        let updated_reference = changes
            .planned_reference()
            .map(str::to_owned)
            .unwrap_or_else(|| original_reference.clone());

        self.repository.commit(changes)?;

        tracing::info!(
            application_id = %application_id,
            role = role.label(),
            assigned_to = %assign_to,
            "role assigned"
        );

        Ok(AssignmentOutcome {
            original_reference,
            updated_reference,
            unassigned_user,
            already_assigned_to_this_user,
        })
    }
}
