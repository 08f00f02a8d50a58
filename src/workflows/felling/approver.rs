//! Approver (field manager) checklist updates while an application sits in
//! `SentForApproval`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    active_assignee, current_status, ApplicationId, AssignedRole, FellingStatus, UserId,
};
use super::repository::{
    ApplicationRepository, ChangeSet, EntityMutation, PersistenceError, RepositoryError,
};
use super::review::{ApproverReview, RecommendedDecision};

/// Checklist state submitted by the approver ahead of the final decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApproverReviewModel {
    pub checked_application: Option<bool>,
    pub checked_documentation: Option<bool>,
    pub checked_case_notes: Option<bool>,
    pub checked_woodland_officer_review: Option<bool>,
    pub requested_decision: Option<RecommendedDecision>,
    pub approved_licence_duration_years: Option<u8>,
    pub duration_change_reason: Option<String>,
}

/// Failures raised by the approver review operations.
#[derive(Debug, thiserror::Error)]
pub enum ApproverReviewError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application has no status history")]
    NoStatusHistory,
    #[error("operation requires status Sent For Approval, application is {0}")]
    InvalidStatus(FellingStatus),
    #[error("performing user is not the assigned field manager")]
    PerformingUserNotAssigned,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Service over the approver review aggregate.
pub struct ApproverReviewService<R> {
    repository: Arc<R>,
}

impl<R> ApproverReviewService<R>
where
    R: ApplicationRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Record the approver's checklist, creating the aggregate on first
    /// touch. Only the assigned field manager may write it, and only while
    /// the application awaits a decision.
    pub fn update_review(
        &self,
        application_id: ApplicationId,
        model: ApproverReviewModel,
        performing_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), ApproverReviewError> {
        if self
            .repository
            .get_application(application_id)?
            .is_none()
        {
            return Err(ApproverReviewError::ApplicationNotFound);
        }

        let history = self.repository.get_status_history(application_id)?;
        let current = current_status(&history)
            .ok_or(ApproverReviewError::NoStatusHistory)?
            .status;
        if current != FellingStatus::SentForApproval {
            return Err(ApproverReviewError::InvalidStatus(current));
        }

        let assignees = self.repository.get_assignee_history(application_id)?;
        let field_manager = active_assignee(&assignees, AssignedRole::FieldManager);
        if field_manager.map(|entry| entry.user) != Some(performing_user) {
            return Err(ApproverReviewError::PerformingUserNotAssigned);
        }

        let mut review = self
            .repository
            .get_approver_review(application_id)?
            .unwrap_or(ApproverReview {
                application_id,
                checked_application: None,
                checked_documentation: None,
                checked_case_notes: None,
                checked_woodland_officer_review: None,
                requested_decision: None,
                approved_licence_duration_years: None,
                duration_change_reason: None,
                last_updated_by: performing_user,
                last_updated_date: now,
            });

        review.checked_application = model.checked_application;
        review.checked_documentation = model.checked_documentation;
        review.checked_case_notes = model.checked_case_notes;
        review.checked_woodland_officer_review = model.checked_woodland_officer_review;
        review.requested_decision = model.requested_decision;
        review.approved_licence_duration_years = model.approved_licence_duration_years;
        review.duration_change_reason = model.duration_change_reason;
        review.last_updated_by = performing_user;
        review.last_updated_date = now;

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::UpsertApproverReview(review));
        self.repository.commit(changes)?;
        Ok(())
    }
}
