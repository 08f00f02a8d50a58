//! Document lifecycle: batch upload with aggregated validation, soft
//! delete, permanent removal, and applicant-visibility hiding. Every
//! operation publishes one audit event whether it succeeds or fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::WorkflowConfig;

use super::domain::{
    ActorType, Application, ApplicationId, Document, DocumentId, DocumentPurpose, UserId,
};
use super::repository::{
    ApplicationRepository, AuditEvent, AuditPublisher, ChangeSet, EntityMutation, FileStorage,
    FileStorageError, PersistenceError, RepositoryError,
};

const AUDIT_DOCUMENTS_ADDED: &str = "felling_documents_added";
const AUDIT_DOCUMENT_SOFT_DELETED: &str = "felling_document_soft_deleted";
const AUDIT_DOCUMENT_REMOVED: &str = "felling_document_removed";
const AUDIT_DOCUMENT_VISIBILITY: &str = "felling_document_visibility_updated";

/// One inbound file in a batch upload.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content: Vec<u8>,
    pub purpose: DocumentPurpose,
    pub visible_to_applicant: bool,
    pub visible_to_consultee: bool,
}

/// A per-file failure collected during a batch upload.
#[derive(Debug, Clone)]
pub struct DocumentUploadFailure {
    pub file_name: String,
    pub reason: FileStorageError,
}

/// Batch upload result: stored documents plus the failures that did not
/// stop the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct AddDocumentsOutcome {
    pub added: Vec<Document>,
    pub failures: Vec<DocumentUploadFailure>,
}

/// Failures raised by document lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("document not found")]
    DocumentNotFound,
    #[error("documents with purpose {0:?} cannot be deleted")]
    PurposeNotRemovable(DocumentPurpose),
    #[error("application already holds the maximum of {limit} documents")]
    TooManyDocuments { limit: usize },
    #[error(transparent)]
    Storage(#[from] FileStorageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Service governing attached files across the application lifecycle.
pub struct DocumentLifecycleService<R, S, A> {
    repository: Arc<R>,
    storage: Arc<S>,
    audit: Arc<A>,
    config: Arc<WorkflowConfig>,
}

impl<R, S, A> DocumentLifecycleService<R, S, A>
where
    R: ApplicationRepository,
    S: FileStorage,
    A: AuditPublisher,
{
    pub fn new(
        repository: Arc<R>,
        storage: Arc<S>,
        audit: Arc<A>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            repository,
            storage,
            audit,
            config,
        }
    }

    /// Store a batch of files. Per-file validation and storage failures are
    /// collected while the remaining files still store and commit; only
    /// structural problems (unknown application, batch over the document
    /// limit) abort the whole call.
    pub fn add_documents(
        &self,
        application_id: ApplicationId,
        attached_by: ActorType,
        uploads: Vec<DocumentUpload>,
        performing_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<AddDocumentsOutcome, DocumentError> {
        let result = self.add_documents_inner(application_id, attached_by, uploads, now);
        self.publish_audit(
            AUDIT_DOCUMENTS_ADDED,
            application_id,
            Some(performing_user),
            match &result {
                Ok(outcome) => json!({
                    "added": outcome.added.len(),
                    "rejected": outcome.failures.len(),
                }),
                Err(error) => json!({ "failure_reason": error.to_string() }),
            },
        );
        result
    }

    fn add_documents_inner(
        &self,
        application_id: ApplicationId,
        attached_by: ActorType,
        uploads: Vec<DocumentUpload>,
        now: DateTime<Utc>,
    ) -> Result<AddDocumentsOutcome, DocumentError> {
        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(DocumentError::ApplicationNotFound)?;

        let live_count = application
            .documents
            .iter()
            .filter(|doc| !doc.is_deleted())
            .count();

        let mut outcome = AddDocumentsOutcome::default();
        let mut accepted = Vec::new();
        for upload in uploads {
            match self.validate_upload(&upload) {
                Ok(()) => accepted.push(upload),
                Err(reason) => outcome.failures.push(DocumentUploadFailure {
                    file_name: upload.file_name,
                    reason,
                }),
            }
        }

        // Only files that survived validation count against the limit.
        let limit = self.config.max_documents_per_application;
        if live_count + accepted.len() > limit {
            return Err(DocumentError::TooManyDocuments { limit });
        }

        let mut changes = ChangeSet::new(application_id);

        for upload in accepted {
            match self
                .storage
                .store_file(application_id, &upload.file_name, &upload.content)
            {
                Ok(location) => {
                    let document = Document {
                        id: DocumentId(Uuid::new_v4()),
                        application_id,
                        purpose: upload.purpose,
                        attached_by,
                        file_name: upload.file_name,
                        location,
                        visible_to_applicant: upload.visible_to_applicant,
                        visible_to_consultee: upload.visible_to_consultee,
                        attached_at: now,
                        deleted_at: None,
                        deleted_by: None,
                    };
                    changes.push(EntityMutation::AddDocument(document.clone()));
                    outcome.added.push(document);
                }
                Err(reason) => outcome.failures.push(DocumentUploadFailure {
                    file_name: upload.file_name,
                    reason,
                }),
            }
        }

        if !changes.is_empty() {
            self.repository.commit(changes)?;
        }
        Ok(outcome)
    }

    fn validate_upload(&self, upload: &DocumentUpload) -> Result<(), FileStorageError> {
        if upload.content.is_empty() {
            return Err(FileStorageError::EmptyContents);
        }
        if upload.content.len() as u64 > self.config.max_file_size_bytes {
            return Err(FileStorageError::FailedValidation(format!(
                "file exceeds maximum size of {} bytes",
                self.config.max_file_size_bytes
            )));
        }
        Ok(())
    }

    /// Soft delete an attachment: the record keeps its deletion timestamp
    /// and deleting user, and the physical file stays put. Removing the
    /// last live woodland management plan document resets the ten-year
    /// licence step to incomplete.
    pub fn soft_delete_document(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
        deleted_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        let result = self.soft_delete_inner(application_id, document_id, deleted_by, now);
        let purpose = self.purpose_for_audit(application_id, document_id, &result);
        let outcome = result.map(|_| ());
        self.publish_document_audit(
            AUDIT_DOCUMENT_SOFT_DELETED,
            application_id,
            document_id,
            Some(deleted_by),
            purpose,
            &outcome,
        );
        outcome
    }

    fn soft_delete_inner(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
        deleted_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<DocumentPurpose, DocumentError> {
        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(DocumentError::ApplicationNotFound)?;
        let document = application
            .document(document_id)
            .ok_or(DocumentError::DocumentNotFound)?;

        if !document.purpose.supports_soft_delete() {
            return Err(DocumentError::PurposeNotRemovable(document.purpose));
        }

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::SoftDeleteDocument {
            document_id,
            deleted_by,
            deleted_at: now,
        });

        let purpose = document.purpose;
        if purpose == DocumentPurpose::WmpDocument && !has_other_live_wmp(&application, document_id)
        {
            let mut step_status = application.step_status.clone();
            step_status.ten_year_licence = Some(false);
            changes.push(EntityMutation::UpdateStepStatus(step_status));
        }

        self.repository.commit(changes)?;
        Ok(purpose)
    }

    /// Permanently remove a transient document. The physical file goes
    /// first; the repository record is only removed once storage succeeds.
    pub fn remove_document_permanently(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
        performing_user: UserId,
    ) -> Result<(), DocumentError> {
        let result = self.remove_inner(application_id, document_id);
        let purpose = self.purpose_for_audit(application_id, document_id, &result);
        let outcome = result.map(|_| ());
        self.publish_document_audit(
            AUDIT_DOCUMENT_REMOVED,
            application_id,
            document_id,
            Some(performing_user),
            purpose,
            &outcome,
        );
        outcome
    }

    fn remove_inner(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
    ) -> Result<DocumentPurpose, DocumentError> {
        let document = self
            .repository
            .get_document(application_id, document_id)?
            .ok_or(DocumentError::DocumentNotFound)?;

        self.storage.remove_file(&document.location)?;

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::RemoveDocument { document_id });
        self.repository.commit(changes)?;
        Ok(document.purpose)
    }

    /// Hide a document from the applicant. Idempotent: hiding an already
    /// hidden document succeeds without change.
    pub fn hide_from_applicant(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
        performing_user: UserId,
    ) -> Result<(), DocumentError> {
        let result = self.hide_inner(application_id, document_id);
        let purpose = self.purpose_for_audit(application_id, document_id, &result);
        let outcome = result.map(|_| ());
        self.publish_document_audit(
            AUDIT_DOCUMENT_VISIBILITY,
            application_id,
            document_id,
            Some(performing_user),
            purpose,
            &outcome,
        );
        outcome
    }

    fn hide_inner(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
    ) -> Result<DocumentPurpose, DocumentError> {
        let document = self
            .repository
            .get_document(application_id, document_id)?
            .ok_or(DocumentError::DocumentNotFound)?;

        let mut changes = ChangeSet::new(application_id);
        changes.push(EntityMutation::SetDocumentVisibility {
            document_id,
            visible_to_applicant: false,
            visible_to_consultee: document.visible_to_consultee,
        });
        self.repository.commit(changes)?;
        Ok(document.purpose)
    }

    /// The purpose recorded in the audit payload. The success path hands it
    /// back from the operation's own read; a permanent removal has already
    /// deleted the record by publish time, so a fresh lookup would find
    /// nothing. Failures fall back to a lookup since the record, if it ever
    /// existed, is still in place.
    fn purpose_for_audit(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
        result: &Result<DocumentPurpose, DocumentError>,
    ) -> Option<DocumentPurpose> {
        match result {
            Ok(purpose) => Some(*purpose),
            Err(_) => self
                .repository
                .get_document(application_id, document_id)
                .ok()
                .flatten()
                .map(|doc| doc.purpose),
        }
    }

    fn publish_document_audit(
        &self,
        name: &'static str,
        application_id: ApplicationId,
        document_id: DocumentId,
        user: Option<UserId>,
        purpose: Option<DocumentPurpose>,
        result: &Result<(), DocumentError>,
    ) {
        let payload = match result {
            Ok(()) => json!({ "purpose": purpose, "document_id": document_id }),
            Err(error) => json!({
                "purpose": purpose,
                "document_id": document_id,
                "failure_reason": error.to_string(),
            }),
        };
        self.publish_audit(name, application_id, user, payload);
    }

    fn publish_audit(
        &self,
        name: &'static str,
        application_id: ApplicationId,
        user_id: Option<UserId>,
        payload: serde_json::Value,
    ) {
        if let Err(error) = self.audit.publish(AuditEvent {
            name,
            application_id,
            user_id,
            payload,
        }) {
            tracing::warn!(event = name, %application_id, "audit publish failed: {error}");
        }
    }
}

fn has_other_live_wmp(application: &Application, excluding: DocumentId) -> bool {
    application
        .live_documents(DocumentPurpose::WmpDocument)
        .any(|doc| doc.id != excluding)
}
