//! Felling licence review workflow: the append-only status and assignment
//! ledgers, the woodland officer review completion gate, return-to-applicant
//! handling, document lifecycle rules, and the approved-in-error correction.
//!
//! Persistence, file storage, audit publishing, and applicant access checks
//! are collaborator traits in [`repository`]; each operation loads what it
//! needs, validates, and commits a single [`repository::ChangeSet`].

pub mod approved_in_error;
pub mod approver;
pub mod assignment;
pub mod confirmed;
pub mod documents;
pub mod domain;
pub mod gate;
pub(crate) mod reference;
pub mod repository;
pub mod return_to_applicant;
pub mod review;
pub mod transitions;
pub mod woodland_officer;

#[cfg(test)]
mod tests;

pub use approved_in_error::{
    ApprovedInErrorError, ApprovedInErrorModel, ApprovedInErrorService, RegenerationDependencies,
};
pub use approver::{ApproverReviewError, ApproverReviewModel, ApproverReviewService};
pub use assignment::{AssignmentError, AssignmentManager, AssignmentOutcome};
pub use confirmed::{
    apply_species, reconcile_species, references_larch, requires_eia_screening,
    ConfirmedFellingDetail, ConfirmedRestockingDetail, FellingOperationType, FellingSpecies,
    ProposedFellingDetail, RestockingProposal, RestockingSpecies, SpeciesDelta,
    LARCH_SPECIES_CODES,
};
pub use documents::{
    AddDocumentsOutcome, DocumentError, DocumentLifecycleService, DocumentUpload,
    DocumentUploadFailure,
};
pub use domain::{
    active_assignee, active_assignments, current_status, ActorType, Application,
    ApplicationId, ApplicationSection, AssignedRole, AssigneeHistory, CaseNote, CaseNoteType,
    Document, DocumentId, DocumentPurpose, FellingStatus, StatusHistory, StepStatus, UserId,
};
pub use gate::{GateContext, GateReport, StageCompletion};
pub use repository::{
    AccessCheckError, ApplicantAccessChecker, ApplicationRepository, AuditError, AuditEvent,
    AuditPublisher, ChangeSet, EntityMutation, FileStorage, FileStorageError, PersistenceError,
    ReferenceGenerationError, ReferenceGenerator, RepositoryError,
};
pub use return_to_applicant::{
    ReturnToApplicantError, ReturnToApplicantRequest, ReturnToApplicantService,
};
pub use review::{
    ApprovedInError, ApproverReview, EiaScreening, LarchCheckDetails, LarchZone, PublicRegister,
    Pw14Checks, RecommendedDecision, WoodlandOfficerReview,
};
pub use transitions::{
    allowed_targets, validate_transition, StatusTransitionManager, TransitionError,
    TransitionOutcome,
};
pub use woodland_officer::{
    CompleteReviewModel, CompleteReviewOutcome, ReviewUpdate, WoodlandOfficerReviewError,
    WoodlandOfficerReviewService,
};
