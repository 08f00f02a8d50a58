use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::workflows::felling::confirmed::{
    ConfirmedFellingDetail, ConfirmedRestockingDetail, FellingOperationType, FellingSpecies,
    ProposedFellingDetail, RestockingProposal, RestockingSpecies,
};
use crate::workflows::felling::domain::{
    ActorType, Application, ApplicationId, AssignedRole, AssigneeHistory, CaseNote, Document,
    DocumentId, DocumentPurpose, FellingStatus, StatusHistory, StepStatus, UserId,
};
use crate::workflows::felling::repository::{
    AccessCheckError, ApplicantAccessChecker, ApplicationRepository, AuditError, AuditEvent,
    AuditPublisher, ChangeSet, EntityMutation, FileStorage, FileStorageError, PersistenceError,
    ReferenceGenerationError, ReferenceGenerator, RepositoryError,
};
use crate::workflows::felling::review::{
    ApprovedInError, ApproverReview, LarchCheckDetails, PublicRegister, WoodlandOfficerReview,
};

pub(super) fn t(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::hours(hours)
}

pub(super) fn user() -> UserId {
    UserId(Uuid::new_v4())
}

#[derive(Default)]
struct RepositoryState {
    applications: HashMap<ApplicationId, Application>,
    status: Vec<StatusHistory>,
    assignees: Vec<AssigneeHistory>,
    reviews: HashMap<ApplicationId, WoodlandOfficerReview>,
    registers: HashMap<ApplicationId, PublicRegister>,
    approver_reviews: HashMap<ApplicationId, ApproverReview>,
    approved_in_error: HashMap<ApplicationId, ApprovedInError>,
    larch: HashMap<ApplicationId, LarchCheckDetails>,
    proposed_felling: Vec<ProposedFellingDetail>,
    confirmed_felling: Vec<ConfirmedFellingDetail>,
    confirmed_restocking: Vec<ConfirmedRestockingDetail>,
    case_notes: Vec<CaseNote>,
}

/// In-memory repository applying changesets atomically, with counters so
/// tests can assert how often reads and commits happened.
#[derive(Default)]
pub(super) struct MemoryRepository {
    state: Mutex<RepositoryState>,
    commits: AtomicUsize,
    application_reads: AtomicUsize,
    fail_commit: Mutex<Option<PersistenceError>>,
}

impl MemoryRepository {
    pub(super) fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub(super) fn application_read_count(&self) -> usize {
        self.application_reads.load(Ordering::SeqCst)
    }

    pub(super) fn fail_next_commit(&self, error: PersistenceError) {
        *self.fail_commit.lock().expect("mutex poisoned") = Some(error);
    }

    pub(super) fn seed_application(&self, application: Application) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.applications.insert(application.id, application);
    }

    pub(super) fn seed_status(&self, id: ApplicationId, status: FellingStatus, at: DateTime<Utc>) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.status.push(StatusHistory {
            application_id: id,
            status,
            created: at,
        });
    }

    pub(super) fn seed_assignee(
        &self,
        id: ApplicationId,
        role: AssignedRole,
        user: UserId,
        at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.assignees.push(AssigneeHistory {
            application_id: id,
            role,
            user,
            assigned: at,
            unassigned: None,
        });
    }

    pub(super) fn seed_review(&self, review: WoodlandOfficerReview) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.reviews.insert(review.application_id, review);
    }

    pub(super) fn seed_register(&self, register: PublicRegister) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.registers.insert(register.application_id, register);
    }

    pub(super) fn seed_confirmed_felling(&self, detail: ConfirmedFellingDetail) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.confirmed_felling.push(detail);
    }

    pub(super) fn seed_proposed_felling(&self, detail: ProposedFellingDetail) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.proposed_felling.push(detail);
    }

    pub(super) fn seed_confirmed_restocking(&self, detail: ConfirmedRestockingDetail) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.confirmed_restocking.push(detail);
    }

    pub(super) fn application(&self, id: ApplicationId) -> Option<Application> {
        let state = self.state.lock().expect("mutex poisoned");
        state.applications.get(&id).cloned()
    }

    pub(super) fn status_history(&self, id: ApplicationId) -> Vec<StatusHistory> {
        let state = self.state.lock().expect("mutex poisoned");
        state
            .status
            .iter()
            .filter(|entry| entry.application_id == id)
            .cloned()
            .collect()
    }

    pub(super) fn assignee_history(&self, id: ApplicationId) -> Vec<AssigneeHistory> {
        let state = self.state.lock().expect("mutex poisoned");
        state
            .assignees
            .iter()
            .filter(|entry| entry.application_id == id)
            .cloned()
            .collect()
    }

    pub(super) fn case_notes(&self, id: ApplicationId) -> Vec<CaseNote> {
        let state = self.state.lock().expect("mutex poisoned");
        state
            .case_notes
            .iter()
            .filter(|note| note.application_id == id)
            .cloned()
            .collect()
    }

    pub(super) fn review(&self, id: ApplicationId) -> Option<WoodlandOfficerReview> {
        let state = self.state.lock().expect("mutex poisoned");
        state.reviews.get(&id).cloned()
    }

    pub(super) fn approver_review(&self, id: ApplicationId) -> Option<ApproverReview> {
        let state = self.state.lock().expect("mutex poisoned");
        state.approver_reviews.get(&id).cloned()
    }

    pub(super) fn approved_in_error_record(&self, id: ApplicationId) -> Option<ApprovedInError> {
        let state = self.state.lock().expect("mutex poisoned");
        state.approved_in_error.get(&id).cloned()
    }

    fn apply(state: &mut RepositoryState, id: ApplicationId, mutation: EntityMutation) {
        match mutation {
            EntityMutation::AppendStatus { status, created } => {
                state.status.push(StatusHistory {
                    application_id: id,
                    status,
                    created,
                });
            }
            EntityMutation::AppendAssignee {
                role,
                user,
                assigned,
            } => {
                state.assignees.push(AssigneeHistory {
                    application_id: id,
                    role,
                    user,
                    assigned,
                    unassigned: None,
                });
            }
            EntityMutation::CloseAssignee {
                role,
                user,
                unassigned,
            } => {
                if let Some(entry) = state.assignees.iter_mut().find(|entry| {
                    entry.application_id == id
                        && entry.role == role
                        && entry.user == user
                        && entry.unassigned.is_none()
                }) {
                    entry.unassigned = Some(unassigned);
                }
            }
            EntityMutation::UpdateAreaCode { area_code } => {
                if let Some(application) = state.applications.get_mut(&id) {
                    application.area_code = Some(area_code);
                }
            }
            EntityMutation::UpdateReference { reference } => {
                if let Some(application) = state.applications.get_mut(&id) {
                    application.reference = reference;
                }
            }
            EntityMutation::AddCaseNote(note) => state.case_notes.push(note),
            EntityMutation::UpsertWoodlandOfficerReview(review) => {
                state.reviews.insert(id, review);
            }
            EntityMutation::UpsertApproverReview(review) => {
                state.approver_reviews.insert(id, review);
            }
            EntityMutation::UpsertApprovedInError(record) => {
                state.approved_in_error.insert(id, record);
            }
            EntityMutation::UpdateStepStatus(step_status) => {
                if let Some(application) = state.applications.get_mut(&id) {
                    application.step_status = step_status;
                }
            }
            EntityMutation::AddDocument(document) => {
                if let Some(application) = state.applications.get_mut(&id) {
                    application.documents.push(document);
                }
            }
            EntityMutation::SoftDeleteDocument {
                document_id,
                deleted_by,
                deleted_at,
            } => {
                if let Some(application) = state.applications.get_mut(&id) {
                    if let Some(document) = application
                        .documents
                        .iter_mut()
                        .find(|doc| doc.id == document_id)
                    {
                        document.deleted_at = Some(deleted_at);
                        document.deleted_by = Some(deleted_by);
                    }
                }
            }
            EntityMutation::RemoveDocument { document_id } => {
                if let Some(application) = state.applications.get_mut(&id) {
                    application.documents.retain(|doc| doc.id != document_id);
                }
            }
            EntityMutation::SetDocumentVisibility {
                document_id,
                visible_to_applicant,
                visible_to_consultee,
            } => {
                if let Some(application) = state.applications.get_mut(&id) {
                    if let Some(document) = application
                        .documents
                        .iter_mut()
                        .find(|doc| doc.id == document_id)
                    {
                        document.visible_to_applicant = visible_to_applicant;
                        document.visible_to_consultee = visible_to_consultee;
                    }
                }
            }
        }
    }
}

impl ApplicationRepository for MemoryRepository {
    fn get_application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.application_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state.applications.get(&id).cloned())
    }

    fn get_status_history(&self, id: ApplicationId) -> Result<Vec<StatusHistory>, RepositoryError> {
        Ok(self.status_history(id))
    }

    fn get_assignee_history(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<AssigneeHistory>, RepositoryError> {
        Ok(self.assignee_history(id))
    }

    fn get_woodland_officer_review(
        &self,
        id: ApplicationId,
    ) -> Result<Option<WoodlandOfficerReview>, RepositoryError> {
        Ok(self.review(id))
    }

    fn get_public_register(
        &self,
        id: ApplicationId,
    ) -> Result<Option<PublicRegister>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state.registers.get(&id).cloned())
    }

    fn get_approver_review(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApproverReview>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state.approver_reviews.get(&id).cloned())
    }

    fn get_approved_in_error(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApprovedInError>, RepositoryError> {
        Ok(self.approved_in_error_record(id))
    }

    fn get_larch_check_details(
        &self,
        id: ApplicationId,
    ) -> Result<Option<LarchCheckDetails>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state.larch.get(&id).cloned())
    }

    fn get_proposed_felling(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ProposedFellingDetail>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state
            .proposed_felling
            .iter()
            .filter(|detail| detail.application_id == id)
            .cloned()
            .collect())
    }

    fn get_confirmed_felling(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmedFellingDetail>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state
            .confirmed_felling
            .iter()
            .filter(|detail| detail.application_id == id)
            .cloned()
            .collect())
    }

    fn get_confirmed_restocking(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmedRestockingDetail>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state
            .confirmed_restocking
            .iter()
            .filter(|detail| detail.application_id == id)
            .cloned()
            .collect())
    }

    fn get_document(
        &self,
        application_id: ApplicationId,
        document_id: DocumentId,
    ) -> Result<Option<Document>, RepositoryError> {
        let state = self.state.lock().expect("mutex poisoned");
        Ok(state
            .applications
            .get(&application_id)
            .and_then(|application| application.document(document_id).cloned()))
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), PersistenceError> {
        if let Some(error) = self.fail_commit.lock().expect("mutex poisoned").take() {
            return Err(error);
        }
        let mut state = self.state.lock().expect("mutex poisoned");
        let id = changes.application_id;
        for mutation in changes.mutations().iter().cloned() {
            Self::apply(&mut state, id, mutation);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("mutex poisoned").clone()
    }
}

impl AuditPublisher for MemoryAudit {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("mutex poisoned").push(event);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub(super) fn contains(&self, location: &str) -> bool {
        self.files.lock().expect("mutex poisoned").contains_key(location)
    }
}

impl FileStorage for MemoryStorage {
    fn store_file(
        &self,
        application_id: ApplicationId,
        file_name: &str,
        content: &[u8],
    ) -> Result<String, FileStorageError> {
        let location = format!("store://{application_id}/{file_name}");
        self.files
            .lock()
            .expect("mutex poisoned")
            .insert(location.clone(), content.to_vec());
        Ok(location)
    }

    fn remove_file(&self, location: &str) -> Result<(), FileStorageError> {
        self.files.lock().expect("mutex poisoned").remove(location);
        Ok(())
    }
}

/// Storage double whose removal always fails, for the permanent-removal
/// failure path.
pub(super) struct BrokenStorage;

impl FileStorage for BrokenStorage {
    fn store_file(
        &self,
        _application_id: ApplicationId,
        _file_name: &str,
        _content: &[u8],
    ) -> Result<String, FileStorageError> {
        Err(FileStorageError::Unknown("storage offline".to_string()))
    }

    fn remove_file(&self, _location: &str) -> Result<(), FileStorageError> {
        Err(FileStorageError::Unknown("storage offline".to_string()))
    }
}

pub(super) struct AllowAccess;

impl ApplicantAccessChecker for AllowAccess {
    fn can_access(
        &self,
        _user: UserId,
        _application: ApplicationId,
    ) -> Result<bool, AccessCheckError> {
        Ok(true)
    }
}

pub(super) struct DenyAccess;

impl ApplicantAccessChecker for DenyAccess {
    fn can_access(
        &self,
        _user: UserId,
        _application: ApplicationId,
    ) -> Result<bool, AccessCheckError> {
        Ok(false)
    }
}

/// Incrementing sequence source that counts how often it was asked.
#[derive(Default)]
pub(super) struct CountingGenerator {
    next: AtomicU64,
    calls: AtomicUsize,
}

impl CountingGenerator {
    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReferenceGenerator for CountingGenerator {
    fn next_sequence(&self, _year: i32) -> Result<u64, ReferenceGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(100 + self.next.fetch_add(1, Ordering::SeqCst))
    }
}

pub(super) fn config_with_areas() -> Arc<WorkflowConfig> {
    let mut areas = BTreeMap::new();
    areas.insert("017".to_string(), "North West & West Midlands".to_string());
    areas.insert("019".to_string(), "Yorkshire & North East".to_string());
    Arc::new(WorkflowConfig {
        configured_areas: areas,
        ..WorkflowConfig::default()
    })
}

pub(super) fn application(reference: &str) -> Application {
    Application {
        id: ApplicationId(Uuid::new_v4()),
        reference: reference.to_string(),
        woodland_owner_id: user(),
        created_by: user(),
        area_code: None,
        step_status: StepStatus::default(),
        documents: Vec::new(),
    }
}

pub(super) fn document(
    application_id: ApplicationId,
    purpose: DocumentPurpose,
    visible_to_applicant: bool,
) -> Document {
    Document {
        id: DocumentId(Uuid::new_v4()),
        application_id,
        purpose,
        attached_by: ActorType::InternalUser,
        file_name: "file.pdf".to_string(),
        location: format!("store://{application_id}/file.pdf"),
        visible_to_applicant,
        visible_to_consultee: false,
        attached_at: t(0),
        deleted_at: None,
        deleted_by: None,
    }
}

pub(super) fn felling_species(code: &str) -> FellingSpecies {
    FellingSpecies {
        species_code: code.to_string(),
    }
}

pub(super) fn restocking_species(code: &str, percentage: Option<f64>) -> RestockingSpecies {
    RestockingSpecies {
        species_code: code.to_string(),
        percentage,
    }
}

pub(super) fn proposed_felling(
    application_id: ApplicationId,
    operation: FellingOperationType,
    codes: &[&str],
) -> ProposedFellingDetail {
    ProposedFellingDetail {
        application_id,
        compartment_id: Uuid::new_v4(),
        operation_type: operation,
        area_hectares: 3.5,
        species: codes.iter().map(|code| felling_species(code)).collect(),
    }
}

pub(super) fn confirmed_felling(
    application_id: ApplicationId,
    operation: FellingOperationType,
    codes: &[&str],
) -> ConfirmedFellingDetail {
    ConfirmedFellingDetail {
        application_id,
        compartment_id: Uuid::new_v4(),
        operation_type: operation,
        area_hectares: 3.5,
        estimated_total_felling_volume: Some(120.0),
        species: codes.iter().map(|code| felling_species(code)).collect(),
    }
}

pub(super) fn confirmed_restocking(application_id: ApplicationId) -> ConfirmedRestockingDetail {
    ConfirmedRestockingDetail {
        application_id,
        compartment_id: Uuid::new_v4(),
        proposal: RestockingProposal::ReplantFelledArea,
        area_hectares: 3.5,
        species: vec![restocking_species("OK", Some(100.0))],
    }
}

/// A review with every officer stage completed, matching the happy-path
/// completion scenario.
pub(super) fn completed_review(
    application_id: ApplicationId,
    officer: UserId,
) -> WoodlandOfficerReview {
    let mut review = WoodlandOfficerReview::new(application_id, officer, t(0));
    review.site_visit_not_needed = true;
    review.pw14_checks_complete = true;
    review.confirmed_felling_and_restocking_complete = true;
    review.is_conditional = Some(false);
    review
}

pub(super) fn exempt_register(application_id: ApplicationId) -> PublicRegister {
    PublicRegister::exempt(application_id, "sensitive site")
}
