//! Status transition manager: the fixed legality table plus the append and
//! its status-specific side effects.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use super::domain::{
    active_assignee, current_status, ApplicationId, AssignedRole, FellingStatus, UserId,
};
use super::reference::{build_reference, reference_prefix};
use super::repository::{
    ApplicationRepository, ChangeSet, EntityMutation, PersistenceError, ReferenceGenerationError,
    ReferenceGenerator, RepositoryError,
};

/// Legal targets from each status. Transitions and gates are deliberately
/// hard-coded domain rules, not data-driven.
pub const fn allowed_targets(current: FellingStatus) -> &'static [FellingStatus] {
    use FellingStatus::*;
    match current {
        Draft => &[Submitted, Withdrawn],
        Submitted => &[AdminOfficerReview, ReturnedToApplicant, Withdrawn],
        AdminOfficerReview => &[WoodlandOfficerReview, ReturnedToApplicant, Withdrawn],
        WoodlandOfficerReview => &[SentForApproval, WithApplicant, Withdrawn],
        SentForApproval => &[
            Approved,
            Refused,
            ReferredToLocalAuthority,
            WithApplicant,
            Withdrawn,
        ],
        ReturnedToApplicant => &[Submitted, Withdrawn],
        WithApplicant => &[WoodlandOfficerReview, Withdrawn],
        Approved => &[ApprovedInError],
        ApprovedInError => &[SentForApproval],
        Refused | ReferredToLocalAuthority | Withdrawn => &[],
    }
}

/// Check a requested transition against the legality table.
pub fn validate_transition(
    current: FellingStatus,
    requested: FellingStatus,
) -> Result<(), TransitionError> {
    if allowed_targets(current).contains(&requested) {
        Ok(())
    } else {
        Err(TransitionError::NotPermitted {
            from: current,
            to: requested,
        })
    }
}

/// Failures raised while requesting a status transition.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application has no status history")]
    NoStatusHistory,
    #[error("transition from {from} to {to} is not permitted")]
    NotPermitted {
        from: FellingStatus,
        to: FellingStatus,
    },
    #[error("final decisions require the assigned field manager")]
    PerformingUserNotFieldManager,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Reference(#[from] ReferenceGenerationError),
}

/// Result of an accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub previous_status: FellingStatus,
    pub new_status: FellingStatus,
    /// Set when a side effect renumbered the application reference.
    pub updated_reference: Option<String>,
}

/// Validates requested transitions, appends to the status ledger, and runs
/// status-specific side effects in the same unit of work.
pub struct StatusTransitionManager<R> {
    repository: Arc<R>,
    generator: Option<Arc<dyn ReferenceGenerator>>,
}

impl<R> StatusTransitionManager<R>
where
    R: ApplicationRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            generator: None,
        }
    }

    pub fn with_reference_generator(
        repository: Arc<R>,
        generator: Arc<dyn ReferenceGenerator>,
    ) -> Self {
        Self {
            repository,
            generator: Some(generator),
        }
    }

    pub fn request_transition(
        &self,
        application_id: ApplicationId,
        new_status: FellingStatus,
        performing_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, TransitionError> {
        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(TransitionError::ApplicationNotFound)?;

        let history = self.repository.get_status_history(application_id)?;
        let current = current_status(&history)
            .ok_or(TransitionError::NoStatusHistory)?
            .status;

        validate_transition(current, new_status)?;

        if current == FellingStatus::SentForApproval && is_final_decision(new_status) {
            let assignees = self.repository.get_assignee_history(application_id)?;
            let field_manager = active_assignee(&assignees, AssignedRole::FieldManager);
            if field_manager.map(|entry| entry.user) != Some(performing_user) {
                return Err(TransitionError::PerformingUserNotFieldManager);
            }
        }

        let mut changes = ChangeSet::new(application_id);
        changes.extend(self.plan_transition(
            application_id,
            &application.reference,
            current,
            new_status,
            now,
        )?);
        let updated_reference = changes.planned_reference().map(str::to_owned);

        self.repository.commit(changes)?;

        tracing::info!(
            application_id = %application_id,
            from = current.label(),
            to = new_status.label(),
            "status transition applied"
        );

        Ok(TransitionOutcome {
            previous_status: current,
            new_status,
            updated_reference,
        })
    }

    /// Plan the ledger append and side effects for an already-loaded
    /// application so callers can fold a triggered transition into their
    /// own changeset.
    pub(crate) fn plan_transition(
        &self,
        application_id: ApplicationId,
        reference: &str,
        current: FellingStatus,
        new_status: FellingStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntityMutation>, TransitionError> {
        validate_transition(current, new_status)?;

        let mut mutations = vec![EntityMutation::AppendStatus {
            status: new_status,
            created: now,
        }];

        // Entering admin officer review finalizes the reference number when
        // a sequence source is configured; the prefix is preserved.
        if new_status == FellingStatus::AdminOfficerReview {
            if let Some(generator) = &self.generator {
                let year = now.year();
                let sequence = generator.next_sequence(year)?;
                mutations.push(EntityMutation::UpdateReference {
                    reference: build_reference(reference_prefix(reference), sequence, year),
                });
            }
        }

        // Leaving the internal pipeline releases the reviewing officers.
        // Parking with the applicant (`WithApplicant`) keeps them assigned.
        if new_status == FellingStatus::ReturnedToApplicant {
            let assignees = self.repository.get_assignee_history(application_id)?;
            for role in [AssignedRole::AdminOfficer, AssignedRole::WoodlandOfficer] {
                if let Some(entry) = active_assignee(&assignees, role) {
                    mutations.push(EntityMutation::CloseAssignee {
                        role,
                        user: entry.user,
                        unassigned: now,
                    });
                }
            }
        }

        Ok(mutations)
    }
}

const fn is_final_decision(status: FellingStatus) -> bool {
    matches!(
        status,
        FellingStatus::Approved | FellingStatus::Refused | FellingStatus::ReferredToLocalAuthority
    )
}
