//! Woodland officer review service: sub-review updates while the review is
//! open, and the gated completion that sends the application for approval.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    active_assignee, current_status, ApplicationId, AssignedRole, FellingStatus, UserId,
};
use super::gate::{GateContext, GateReport};
use super::repository::{
    ApplicationRepository, ChangeSet, EntityMutation, PersistenceError, RepositoryError,
};
use super::review::{EiaScreening, Pw14Checks, WoodlandOfficerReview};

/// One sub-review mutation applied to the review aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewUpdate {
    SiteVisit {
        not_needed: bool,
        artefacts_created: Option<DateTime<Utc>>,
        notes_retrieved: Option<DateTime<Utc>>,
    },
    Pw14Checks {
        checks: Pw14Checks,
        complete: bool,
    },
    FellingAndRestockingComplete(bool),
    Conditions {
        is_conditional: bool,
        sent_to_applicant: Option<DateTime<Utc>>,
    },
    LarchCheckComplete(bool),
    EiaScreening(EiaScreening),
}

/// Recommendation recorded when the review is completed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteReviewModel {
    pub recommended_licence_duration_years: Option<u8>,
    pub recommendation_for_decision_public_register: Option<bool>,
    pub recommendation_reason: Option<String>,
}

/// Successful completion hands back the assigned field manager so the
/// caller can notify them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteReviewOutcome {
    pub field_manager: UserId,
}

/// Failures raised by the woodland officer review operations.
#[derive(Debug, thiserror::Error)]
pub enum WoodlandOfficerReviewError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application has no status history")]
    NoStatusHistory,
    #[error("operation requires status Woodland Officer Review, application is {0}")]
    InvalidStatus(FellingStatus),
    #[error("performing user is not the assigned woodland officer")]
    PerformingUserNotAssigned,
    #[error("no public register record exists for the application")]
    NoPublicRegister,
    #[error("no field manager is currently assigned")]
    NoFieldManagerAssigned,
    #[error("review stages are incomplete")]
    StagesIncomplete(GateReport),
    #[error("EIA screening must be completed before the review can be completed")]
    EiaScreeningIncomplete,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Service over the woodland officer review aggregate.
pub struct WoodlandOfficerReviewService<R> {
    repository: Arc<R>,
}

impl<R> WoodlandOfficerReviewService<R>
where
    R: ApplicationRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Apply one sub-review update, creating the aggregate on first touch.
    /// Only legal while the application sits in woodland officer review.
    pub fn update_review(
        &self,
        application_id: ApplicationId,
        update: ReviewUpdate,
        performing_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), WoodlandOfficerReviewError> {
        self.require_review_status(application_id)?;

        let mut review = self
            .repository
            .get_woodland_officer_review(application_id)?
            .unwrap_or_else(|| WoodlandOfficerReview::new(application_id, performing_user, now));

        match update {
            ReviewUpdate::SiteVisit {
                not_needed,
                artefacts_created,
                notes_retrieved,
            } => {
                review.site_visit_not_needed = not_needed;
                review.site_visit_artefacts_created = artefacts_created;
                review.site_visit_notes_retrieved = notes_retrieved;
            }
            ReviewUpdate::Pw14Checks { checks, complete } => {
                review.pw14 = checks;
                review.pw14_checks_complete = complete;
            }
            ReviewUpdate::FellingAndRestockingComplete(complete) => {
                review.confirmed_felling_and_restocking_complete = complete;
            }
            ReviewUpdate::Conditions {
                is_conditional,
                sent_to_applicant,
            } => {
                review.is_conditional = Some(is_conditional);
                review.conditions_sent_to_applicant = sent_to_applicant;
            }
            ReviewUpdate::LarchCheckComplete(complete) => {
                review.larch_check_complete = complete;
            }
            ReviewUpdate::EiaScreening(eia) => {
                review.eia = eia;
            }
        }
        review.touch(performing_user, now);

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::UpsertWoodlandOfficerReview(review));
        self.repository.commit(changes)?;
        Ok(())
    }

    /// Complete the review and send the application for approval. Every
    /// applicable stage must be completed, the performing user must be the
    /// assigned woodland officer, and a field manager must be in place to
    /// receive the case.
    pub fn complete_review(
        &self,
        application_id: ApplicationId,
        model: CompleteReviewModel,
        performing_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<CompleteReviewOutcome, WoodlandOfficerReviewError> {
        self.require_review_status(application_id)?;

        let assignees = self.repository.get_assignee_history(application_id)?;
        let woodland_officer = active_assignee(&assignees, AssignedRole::WoodlandOfficer);
        if woodland_officer.map(|entry| entry.user) != Some(performing_user) {
            return Err(WoodlandOfficerReviewError::PerformingUserNotAssigned);
        }

        let review = self.repository.get_woodland_officer_review(application_id)?;
        let public_register = self.repository.get_public_register(application_id)?;
        let larch_details = self.repository.get_larch_check_details(application_id)?;
        let proposed_felling = self.repository.get_proposed_felling(application_id)?;
        let confirmed_felling = self.repository.get_confirmed_felling(application_id)?;
        let confirmed_restocking = self.repository.get_confirmed_restocking(application_id)?;

        if public_register.is_none() {
            return Err(WoodlandOfficerReviewError::NoPublicRegister);
        }

        let context = GateContext {
            review: review.as_ref(),
            public_register: public_register.as_ref(),
            larch_details: larch_details.as_ref(),
            proposed_felling: &proposed_felling,
            confirmed_felling: &confirmed_felling,
            confirmed_restocking: &confirmed_restocking,
        };

        let report = context.report(now);
        if !report.all_required_complete() {
            return Err(WoodlandOfficerReviewError::StagesIncomplete(report));
        }
        if !context.eia_screening_satisfied() {
            return Err(WoodlandOfficerReviewError::EiaScreeningIncomplete);
        }

        let field_manager = active_assignee(&assignees, AssignedRole::FieldManager)
            .map(|entry| entry.user)
            .ok_or(WoodlandOfficerReviewError::NoFieldManagerAssigned)?;

        let mut review = review
            .unwrap_or_else(|| WoodlandOfficerReview::new(application_id, performing_user, now));
        review.recommended_licence_duration_years = model.recommended_licence_duration_years;
        review.recommendation_for_decision_public_register =
            model.recommendation_for_decision_public_register;
        review.recommendation_reason = model.recommendation_reason;
        review.touch(performing_user, now);

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::UpsertWoodlandOfficerReview(review));
        changes.push(EntityMutation::AppendStatus {
            status: FellingStatus::SentForApproval,
            created: now,
        });
        self.repository.commit(changes)?;

        tracing::info!(
            application_id = %application_id,
            field_manager = %field_manager,
            "woodland officer review completed, sent for approval"
        );

        Ok(CompleteReviewOutcome { field_manager })
    }

    fn require_review_status(
        &self,
        application_id: ApplicationId,
    ) -> Result<(), WoodlandOfficerReviewError> {
        if self
            .repository
            .get_application(application_id)?
            .is_none()
        {
            return Err(WoodlandOfficerReviewError::ApplicationNotFound);
        }

        let history = self.repository.get_status_history(application_id)?;
        let current = current_status(&history)
            .ok_or(WoodlandOfficerReviewError::NoStatusHistory)?
            .status;
        if current != FellingStatus::WoodlandOfficerReview {
            return Err(WoodlandOfficerReviewError::InvalidStatus(current));
        }
        Ok(())
    }
}
