//! Approved-in-error correction: reverts an approved application, records
//! why, optionally renumbers the reference, and pulls the issued licence
//! document out of the applicant's view.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use super::domain::{current_status, ApplicationId, DocumentPurpose, FellingStatus, UserId};
use super::reference::{build_reference, reference_prefix};
use super::repository::{
    ApplicationRepository, ChangeSet, EntityMutation, ReferenceGenerationError,
    ReferenceGenerator, RepositoryError,
};
use super::review::ApprovedInError;

/// Inputs for the correction.
#[derive(Debug, Clone)]
pub struct ApprovedInErrorModel {
    pub reason: String,
    /// True for free-text reasons; false for reference mix-ups, which are
    /// the only case that renumbers.
    pub reason_other: bool,
    pub previous_reference: Option<String>,
}

/// Optional reference regeneration dependencies. When absent, the
/// renumbering step is skipped silently.
pub struct RegenerationDependencies {
    pub generator: Arc<dyn ReferenceGenerator>,
}

/// Failures raised by the correction.
#[derive(Debug, thiserror::Error)]
pub enum ApprovedInErrorError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("application has no status history")]
    NoStatusHistory,
    #[error("application must be Approved to be set approved in error, but is {0}")]
    InvalidStatus(FellingStatus),
    #[error("Could not update document visibility")]
    DocumentVisibility,
    #[error(transparent)]
    Reference(#[from] ReferenceGenerationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Persistence(String),
}

/// Service reverting approvals issued in error.
pub struct ApprovedInErrorService<R> {
    repository: Arc<R>,
    regeneration: Option<RegenerationDependencies>,
}

impl<R> ApprovedInErrorService<R>
where
    R: ApplicationRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            regeneration: None,
        }
    }

    pub fn with_regeneration(
        repository: Arc<R>,
        regeneration: RegenerationDependencies,
    ) -> Self {
        Self {
            repository,
            regeneration: Some(regeneration),
        }
    }

    pub fn set_to_approved_in_error(
        &self,
        application_id: ApplicationId,
        model: ApprovedInErrorModel,
        performing_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovedInErrorError> {
        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(ApprovedInErrorError::ApplicationNotFound)?;

        let history = self.repository.get_status_history(application_id)?;
        let current = current_status(&history)
            .ok_or(ApprovedInErrorError::NoStatusHistory)?
            .status;
        if current != FellingStatus::Approved {
            return Err(ApprovedInErrorError::InvalidStatus(current));
        }

        let mut record = match self.repository.get_approved_in_error(application_id)? {
            Some(mut existing) => {
                existing.reason = model.reason.clone();
                existing.reason_other = model.reason_other;
                existing.previous_reference = model.previous_reference.clone();
                existing.last_updated_by = performing_user;
                existing.last_updated_date = now;
                existing
            }
            None => ApprovedInError {
                application_id,
                reason: model.reason.clone(),
                reason_other: model.reason_other,
                previous_reference: model.previous_reference.clone(),
                last_updated_by: performing_user,
                last_updated_date: now,
            },
        };
        record.application_id = application_id;

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::UpsertApprovedInError(record));

        // Renumbering applies only to genuine reference mix-ups and only
        // when the sequence source is configured.
        if !model.reason_other {
            if let Some(regeneration) = &self.regeneration {
                let reloaded = self
                    .repository
                    .get_application(application_id)?
                    .ok_or(ApprovedInErrorError::ApplicationNotFound)?;
                let previous = model
                    .previous_reference
                    .as_deref()
                    .unwrap_or(reloaded.reference.as_str());
                let year = now.year();
                let sequence = regeneration.generator.next_sequence(year)?;
                changes.push(EntityMutation::UpdateReference {
                    reference: build_reference(reference_prefix(previous), sequence, year),
                });
            }
        }

        changes.push(EntityMutation::AppendStatus {
            status: FellingStatus::ApprovedInError,
            created: now,
        });

        // The issued licence document must disappear from the applicant's
        // view once the approval is reversed.
        if let Some(licence) = application
            .live_documents(DocumentPurpose::ApplicationDocument)
            .next()
        {
            let document = self
                .repository
                .get_document(application_id, licence.id)
                .map_err(|_| ApprovedInErrorError::DocumentVisibility)?
                .ok_or(ApprovedInErrorError::DocumentVisibility)?;
            changes.push(EntityMutation::SetDocumentVisibility {
                document_id: document.id,
                visible_to_applicant: false,
                visible_to_consultee: document.visible_to_consultee,
            });
        }

        self.repository
            .commit(changes)
            .map_err(|error| ApprovedInErrorError::Persistence(error.to_string()))?;

        tracing::info!(
            application_id = %application_id,
            reason_other = model.reason_other,
            "application set to approved in error"
        );

        Ok(())
    }
}
