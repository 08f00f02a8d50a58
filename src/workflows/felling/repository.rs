//! Storage and collaborator abstractions so the workflow services can be
//! exercised in isolation. Reads are granular; writes travel as a single
//! [`ChangeSet`] committed at the end of each operation, so a failure before
//! the commit leaves nothing behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::confirmed::{ConfirmedFellingDetail, ConfirmedRestockingDetail, ProposedFellingDetail};
use super::domain::{
    Application, ApplicationId, AssignedRole, AssigneeHistory, CaseNote, Document, DocumentId,
    FellingStatus, StatusHistory, StepStatus, UserId,
};
use super::review::{
    ApprovedInError, ApproverReview, LarchCheckDetails, PublicRegister, WoodlandOfficerReview,
};

/// One staged entity mutation. Applied atomically with the rest of its
/// changeset or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityMutation {
    AppendStatus {
        status: FellingStatus,
        created: DateTime<Utc>,
    },
    AppendAssignee {
        role: AssignedRole,
        user: UserId,
        assigned: DateTime<Utc>,
    },
    CloseAssignee {
        role: AssignedRole,
        user: UserId,
        unassigned: DateTime<Utc>,
    },
    UpdateAreaCode {
        area_code: String,
    },
    UpdateReference {
        reference: String,
    },
    AddCaseNote(CaseNote),
    UpsertWoodlandOfficerReview(WoodlandOfficerReview),
    UpsertApproverReview(ApproverReview),
    UpsertApprovedInError(ApprovedInError),
    UpdateStepStatus(StepStatus),
    AddDocument(Document),
    SoftDeleteDocument {
        document_id: DocumentId,
        deleted_by: UserId,
        deleted_at: DateTime<Utc>,
    },
    RemoveDocument {
        document_id: DocumentId,
    },
    SetDocumentVisibility {
        document_id: DocumentId,
        visible_to_applicant: bool,
        visible_to_consultee: bool,
    },
}

/// Unit of work for one application. Built up in memory during an operation
/// and committed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub application_id: ApplicationId,
    mutations: Vec<EntityMutation>,
}

impl ChangeSet {
    pub fn new(application_id: ApplicationId) -> Self {
        Self {
            application_id,
            mutations: Vec::new(),
        }
    }

    pub fn push(&mut self, mutation: EntityMutation) {
        self.mutations.push(mutation);
    }

    pub fn extend(&mut self, mutations: impl IntoIterator<Item = EntityMutation>) {
        self.mutations.extend(mutations);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn mutations(&self) -> &[EntityMutation] {
        &self.mutations
    }

    /// The reference the application will carry after this changeset, if
    /// any staged mutation renumbers it.
    pub fn planned_reference(&self) -> Option<&str> {
        self.mutations.iter().rev().find_map(|mutation| match mutation {
            EntityMutation::UpdateReference { reference } => Some(reference.as_str()),
            _ => None,
        })
    }
}

/// Error enumeration for repository read failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Typed commit failure from the storage collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("save failed: {0}")]
    General(String),
    #[error("entity not found during save")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for applications, their ledgers, and the review
/// aggregates.
pub trait ApplicationRepository: Send + Sync {
    fn get_application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn get_status_history(&self, id: ApplicationId) -> Result<Vec<StatusHistory>, RepositoryError>;
    fn get_assignee_history(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<AssigneeHistory>, RepositoryError>;
    fn get_woodland_officer_review(
        &self,
        id: ApplicationId,
    ) -> Result<Option<WoodlandOfficerReview>, RepositoryError>;
    fn get_public_register(
        &self,
        id: ApplicationId,
    ) -> Result<Option<PublicRegister>, RepositoryError>;
    fn get_approver_review(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApproverReview>, RepositoryError>;
    fn get_approved_in_error(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApprovedInError>, RepositoryError>;
    fn get_larch_check_details(
        &self,
        id: ApplicationId,
    ) -> Result<Option<LarchCheckDetails>, RepositoryError>;
    fn get_proposed_felling(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ProposedFellingDetail>, RepositoryError>;
    fn get_confirmed_felling(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmedFellingDetail>, RepositoryError>;
    fn get_confirmed_restocking(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmedRestockingDetail>, RepositoryError>;
    fn get_document(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
    ) -> Result<Option<Document>, RepositoryError>;

    /// Apply every mutation in the changeset or none of them.
    fn commit(&self, changes: ChangeSet) -> Result<(), PersistenceError>;
}

/// Typed failure reason from the file storage collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FileStorageError {
    #[error("file failed validation: {0}")]
    FailedValidation(String),
    #[error("file contents empty")]
    EmptyContents,
    #[error("file storage failure: {0}")]
    Unknown(String),
}

/// Physical file store for attached documents.
pub trait FileStorage: Send + Sync {
    /// Store a file and return its storage location.
    fn store_file(
        &self,
        application_id: ApplicationId,
        file_name: &str,
        content: &[u8],
    ) -> Result<String, FileStorageError>;

    fn remove_file(&self, location: &str) -> Result<(), FileStorageError>;
}

/// Structured audit payload published for every document lifecycle
/// operation, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub name: &'static str,
    pub application_id: ApplicationId,
    pub user_id: Option<UserId>,
    pub payload: Value,
}

/// Audit dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}

/// Outbound audit trail hook. Publish failures never fail the surrounding
/// operation; callers log and continue.
pub trait AuditPublisher: Send + Sync {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Error from the applicant access collaborator.
#[derive(Debug, thiserror::Error)]
pub enum AccessCheckError {
    #[error("access check unavailable: {0}")]
    Unavailable(String),
}

/// Verifies an external applicant can see a given application.
pub trait ApplicantAccessChecker: Send + Sync {
    fn can_access(
        &self,
        user: UserId,
        application: ApplicationId,
    ) -> Result<bool, AccessCheckError>;
}

/// Error from the reference sequence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceGenerationError {
    #[error("reference generation failed: {0}")]
    Failed(String),
}

/// Supplies the next reference sequence number for a given year.
pub trait ReferenceGenerator: Send + Sync {
    fn next_sequence(&self, year: i32) -> Result<u64, ReferenceGenerationError>;
}
