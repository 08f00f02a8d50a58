//! Return-to-applicant workflow: hands the application back for rework,
//! with status-dependent authorization, case-note typing, and role
//! reshuffling.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    active_assignee, active_assignments, current_status, ApplicationId, ApplicationSection,
    AssignedRole, CaseNote, CaseNoteType, FellingStatus, UserId,
};
use super::repository::{
    AccessCheckError, ApplicantAccessChecker, ApplicationRepository, ChangeSet, EntityMutation,
    PersistenceError, RepositoryError,
};
use super::transitions::{StatusTransitionManager, TransitionError};

/// Inputs for a return request.
#[derive(Debug, Clone)]
pub struct ReturnToApplicantRequest {
    /// The applicant who will receive the application.
    pub applicant: UserId,
    pub performing_user: UserId,
    pub is_account_admin: bool,
    pub sections_requiring_attention: Vec<ApplicationSection>,
    /// No note is written when this is absent.
    pub case_note: Option<String>,
}

/// Failures raised by the return workflow.
#[derive(Debug, thiserror::Error)]
pub enum ReturnToApplicantError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application has no status history")]
    NoStatusHistory,
    #[error("applicant does not have access to the application")]
    ApplicantCannotAccess,
    #[error(transparent)]
    AccessCheck(#[from] AccessCheckError),
    #[error("an application with status {0} cannot be returned")]
    CannotReturnFrom(FellingStatus),
    #[error("performing user does not hold a role permitted to return from {0}")]
    PerformingUserNotAuthorised(FellingStatus),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Returns applications to the applicant side of the process.
pub struct ReturnToApplicantService<R, X> {
    repository: Arc<R>,
    transitions: StatusTransitionManager<R>,
    access: Arc<X>,
}

impl<R, X> ReturnToApplicantService<R, X>
where
    R: ApplicationRepository,
    X: ApplicantAccessChecker,
{
    pub fn new(
        repository: Arc<R>,
        transitions: StatusTransitionManager<R>,
        access: Arc<X>,
    ) -> Self {
        Self {
            repository,
            transitions,
            access,
        }
    }

    /// Return the application to the applicant. Hands back the user ids of
    /// the remaining internal assignees so the caller can notify them.
    pub fn return_to_applicant(
        &self,
        application_id: ApplicationId,
        request: ReturnToApplicantRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserId>, ReturnToApplicantError> {
        let mut application = self
            .repository
            .get_application(application_id)?
            .ok_or(ReturnToApplicantError::ApplicationNotFound)?;

        if !self.access.can_access(request.applicant, application_id)? {
            return Err(ReturnToApplicantError::ApplicantCannotAccess);
        }

        let history = self.repository.get_status_history(application_id)?;
        let current = current_status(&history)
            .ok_or(ReturnToApplicantError::NoStatusHistory)?
            .status;

        let target = target_status(current)
            .ok_or(ReturnToApplicantError::CannotReturnFrom(current))?;

        let assignees = self.repository.get_assignee_history(application_id)?;
        if !request.is_account_admin {
            let permitted = permitted_roles(current);
            let authorised = permitted.iter().any(|role| {
                active_assignee(&assignees, *role)
                    .is_some_and(|entry| entry.user == request.performing_user)
            });
            if !authorised {
                return Err(ReturnToApplicantError::PerformingUserNotAuthorised(current));
            }
        }

        let mut changes = ChangeSet::new(application_id);

        if let Some(text) = request
            .case_note
            .as_deref()
            .filter(|text| !text.trim().is_empty())
        {
            changes.push(EntityMutation::AddCaseNote(CaseNote {
                application_id,
                note_type: case_note_type(current),
                text: text.to_string(),
                visible_to_applicant: true,
                visible_to_consultee: false,
                created_by: request.performing_user,
                created_at: now,
            }));
        }

        for section in &request.sections_requiring_attention {
            application.step_status.mark_requires_attention(*section);
        }
        changes.push(EntityMutation::UpdateStepStatus(
            application.step_status.clone(),
        ));

        // The ledger append and the officer release for `ReturnedToApplicant`
        // are transition side effects, planned by the transition manager so
        // direct transition requests behave identically.
        changes.extend(self.transitions.plan_transition(
            application_id,
            &application.reference,
            current,
            target,
            now,
        )?);

        // Reassign the applicant role to the target user.
        if let Some(existing) = active_assignee(&assignees, AssignedRole::Applicant) {
            if existing.user != request.applicant {
                changes.push(EntityMutation::CloseAssignee {
                    role: AssignedRole::Applicant,
                    user: existing.user,
                    unassigned: now,
                });
                changes.push(EntityMutation::AppendAssignee {
                    role: AssignedRole::Applicant,
                    user: request.applicant,
                    assigned: now,
                });
            }
        } else {
            changes.push(EntityMutation::AppendAssignee {
                role: AssignedRole::Applicant,
                user: request.applicant,
                assigned: now,
            });
        }

        let notify: Vec<UserId> = active_assignments(&assignees)
            .filter(|entry| {
                !matches!(entry.role, AssignedRole::Applicant | AssignedRole::Author)
            })
            .map(|entry| entry.user)
            .collect();

        self.repository.commit(changes)?;

        tracing::info!(
            application_id = %application_id,
            from = current.label(),
            to = target.label(),
            "application returned to applicant"
        );

        Ok(notify)
    }
}

fn target_status(current: FellingStatus) -> Option<FellingStatus> {
    match current {
        FellingStatus::Submitted | FellingStatus::AdminOfficerReview => {
            Some(FellingStatus::ReturnedToApplicant)
        }
        FellingStatus::WoodlandOfficerReview | FellingStatus::SentForApproval => {
            Some(FellingStatus::WithApplicant)
        }
        _ => None,
    }
}

fn permitted_roles(current: FellingStatus) -> &'static [AssignedRole] {
    match current {
        FellingStatus::Submitted | FellingStatus::AdminOfficerReview => {
            &[AssignedRole::AdminOfficer]
        }
        FellingStatus::WoodlandOfficerReview => {
            &[AssignedRole::AdminOfficer, AssignedRole::WoodlandOfficer]
        }
        FellingStatus::SentForApproval => &[
            AssignedRole::AdminOfficer,
            AssignedRole::WoodlandOfficer,
            AssignedRole::FieldManager,
        ],
        _ => &[],
    }
}

fn case_note_type(current: FellingStatus) -> CaseNoteType {
    match current {
        FellingStatus::AdminOfficerReview => CaseNoteType::AdminOfficerReviewComment,
        FellingStatus::WoodlandOfficerReview => CaseNoteType::WoodlandOfficerReviewComment,
        _ => CaseNoteType::ReturnToApplicantComment,
    }
}
