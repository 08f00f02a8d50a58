use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier wrapper for felling licence applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

/// Identifier wrapper for internal and external users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

/// Identifier wrapper for attached documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a felling licence application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FellingStatus {
    Draft,
    Submitted,
    AdminOfficerReview,
    WoodlandOfficerReview,
    SentForApproval,
    Approved,
    Refused,
    ReferredToLocalAuthority,
    Withdrawn,
    ReturnedToApplicant,
    WithApplicant,
    ApprovedInError,
}

impl FellingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::AdminOfficerReview => "Admin Officer Review",
            Self::WoodlandOfficerReview => "Woodland Officer Review",
            Self::SentForApproval => "Sent For Approval",
            Self::Approved => "Approved",
            Self::Refused => "Refused",
            Self::ReferredToLocalAuthority => "Referred To Local Authority",
            Self::Withdrawn => "Withdrawn",
            Self::ReturnedToApplicant => "Returned To Applicant",
            Self::WithApplicant => "With Applicant",
            Self::ApprovedInError => "Approved In Error",
        }
    }

    /// Terminal states accept no further transitions at all.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Refused | Self::ReferredToLocalAuthority | Self::Withdrawn
        )
    }
}

impl fmt::Display for FellingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Staff and applicant roles bound to an application for a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedRole {
    Author,
    Applicant,
    AdminOfficer,
    WoodlandOfficer,
    FieldManager,
}

impl AssignedRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Author => "Author",
            Self::Applicant => "Applicant",
            Self::AdminOfficer => "Admin Officer",
            Self::WoodlandOfficer => "Woodland Officer",
            Self::FieldManager => "Field Manager",
        }
    }

    /// Roles held by internal staff rather than the applicant side.
    pub const fn is_internal(self) -> bool {
        matches!(
            self,
            Self::AdminOfficer | Self::WoodlandOfficer | Self::FieldManager
        )
    }
}

impl fmt::Display for AssignedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Append-only entry in the status ledger. Never updated or deleted;
/// every transition is a fresh append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
    pub application_id: ApplicationId,
    pub status: FellingStatus,
    pub created: DateTime<Utc>,
}

/// Entry in the assignment ledger. Superseded entries are closed with an
/// unassigned timestamp, never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeHistory {
    pub application_id: ApplicationId,
    pub role: AssignedRole,
    pub user: UserId,
    pub assigned: DateTime<Utc>,
    pub unassigned: Option<DateTime<Utc>>,
}

impl AssigneeHistory {
    pub fn is_active(&self) -> bool {
        self.unassigned.is_none()
    }
}

/// Current status is defined as the ledger entry with the latest creation
/// timestamp.
pub fn current_status(history: &[StatusHistory]) -> Option<&StatusHistory> {
    history.iter().max_by_key(|entry| entry.created)
}

/// The single active holder of a role, if any.
pub fn active_assignee(history: &[AssigneeHistory], role: AssignedRole) -> Option<&AssigneeHistory> {
    history
        .iter()
        .find(|entry| entry.role == role && entry.is_active())
}

/// All currently open assignments across roles.
pub fn active_assignments(history: &[AssigneeHistory]) -> impl Iterator<Item = &AssigneeHistory> {
    history.iter().filter(|entry| entry.is_active())
}

/// Sections of the application an applicant completes, each tracked with a
/// tri-state completion flag (`None` = untouched).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSection {
    SelectedCompartments,
    FellingAndRestockingDetails,
    Constraints,
    SupportingDocumentation,
    TenYearLicence,
    TermsAndConditions,
}

impl ApplicationSection {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::SelectedCompartments,
            Self::FellingAndRestockingDetails,
            Self::Constraints,
            Self::SupportingDocumentation,
            Self::TenYearLicence,
            Self::TermsAndConditions,
        ]
    }
}

/// Per-section completion flags on the root aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub selected_compartments: Option<bool>,
    pub felling_and_restocking_details: Option<bool>,
    pub constraints: Option<bool>,
    pub supporting_documentation: Option<bool>,
    pub ten_year_licence: Option<bool>,
    pub terms_and_conditions: Option<bool>,
}

impl StepStatus {
    pub fn section(&self, section: ApplicationSection) -> Option<bool> {
        match section {
            ApplicationSection::SelectedCompartments => self.selected_compartments,
            ApplicationSection::FellingAndRestockingDetails => {
                self.felling_and_restocking_details
            }
            ApplicationSection::Constraints => self.constraints,
            ApplicationSection::SupportingDocumentation => self.supporting_documentation,
            ApplicationSection::TenYearLicence => self.ten_year_licence,
            ApplicationSection::TermsAndConditions => self.terms_and_conditions,
        }
    }

    fn section_mut(&mut self, section: ApplicationSection) -> &mut Option<bool> {
        match section {
            ApplicationSection::SelectedCompartments => &mut self.selected_compartments,
            ApplicationSection::FellingAndRestockingDetails => {
                &mut self.felling_and_restocking_details
            }
            ApplicationSection::Constraints => &mut self.constraints,
            ApplicationSection::SupportingDocumentation => &mut self.supporting_documentation,
            ApplicationSection::TenYearLicence => &mut self.ten_year_licence,
            ApplicationSection::TermsAndConditions => &mut self.terms_and_conditions,
        }
    }

    /// Flag a section as needing rework before the application can come
    /// back from the applicant.
    pub fn mark_requires_attention(&mut self, section: ApplicationSection) {
        *self.section_mut(section) = Some(false);
    }
}

/// What a document was attached for. Drives soft-delete eligibility and
/// visibility handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPurpose {
    Attachment,
    ApplicationDocument,
    EiaAttachment,
    WmpDocument,
    SiteVisitAttachment,
    TreeHealthAttachment,
    CorrespondenceInbound,
    CorrespondenceOutbound,
    ConstraintReport,
}

impl DocumentPurpose {
    /// Only applicant- or officer-supplied attachments may be soft
    /// deleted; generated documents and correspondence are kept.
    pub const fn supports_soft_delete(self) -> bool {
        matches!(
            self,
            Self::Attachment
                | Self::EiaAttachment
                | Self::WmpDocument
                | Self::SiteVisitAttachment
                | Self::TreeHealthAttachment
        )
    }
}

/// Which side of the process attached a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    InternalUser,
    ExternalApplicant,
    System,
}

/// File attached to an application. Soft-deleted documents stay queryable
/// for audit but drop out of applicant-visible listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub purpose: DocumentPurpose,
    pub attached_by: ActorType,
    pub file_name: String,
    pub location: String,
    pub visible_to_applicant: bool,
    pub visible_to_consultee: bool,
    pub attached_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Case note categories; the return-to-applicant workflow picks the type
/// from the status being left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseNoteType {
    CaseNote,
    ReturnToApplicantComment,
    AdminOfficerReviewComment,
    WoodlandOfficerReviewComment,
}

/// Free-text note on the case file with applicant/consultee visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseNote {
    pub application_id: ApplicationId,
    pub note_type: CaseNoteType,
    pub text: String,
    pub visible_to_applicant: bool,
    pub visible_to_consultee: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Root aggregate. Ledgers and review aggregates are loaded explicitly
/// through the repository rather than navigated from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub reference: String,
    pub woodland_owner_id: UserId,
    pub created_by: UserId,
    pub area_code: Option<String>,
    pub step_status: StepStatus,
    pub documents: Vec<Document>,
}

impl Application {
    /// Live (non-soft-deleted) documents of a given purpose.
    pub fn live_documents(&self, purpose: DocumentPurpose) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .filter(move |doc| doc.purpose == purpose && !doc.is_deleted())
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }
}
