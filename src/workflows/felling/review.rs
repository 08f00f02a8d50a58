//! Per-application review aggregates: the woodland officer checklist, the
//! public register window, the approver checklist, and the approved-in-error
//! correction record. Each is a singleton keyed by application id, loaded and
//! upserted through the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, UserId};

/// PW14 compliance sub-checks. Any flag set without the parent completion
/// flag leaves the stage in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pw14Checks {
    pub land_information_search_checked: Option<bool>,
    pub are_proposals_uk_forestry_standard_compliant: Option<bool>,
    pub tpo_or_conservation_area_declared: Option<bool>,
    pub is_application_valid: Option<bool>,
    pub local_authority_consulted: Option<bool>,
}

impl Pw14Checks {
    pub fn any_started(&self) -> bool {
        self.land_information_search_checked.is_some()
            || self.are_proposals_uk_forestry_standard_compliant.is_some()
            || self.tpo_or_conservation_area_declared.is_some()
            || self.is_application_valid.is_some()
            || self.local_authority_consulted.is_some()
    }
}

/// EIA screening flags. The screening stage never shows on the task list;
/// it only blocks overall review completion when required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EiaScreening {
    pub screening_complete: bool,
    pub threshold_exceeded: Option<bool>,
    pub tracker_updated: Option<bool>,
    pub checklist_sent: Option<bool>,
}

/// Checklist state for the Woodland Officer Review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoodlandOfficerReview {
    pub application_id: ApplicationId,
    pub site_visit_not_needed: bool,
    pub site_visit_artefacts_created: Option<DateTime<Utc>>,
    pub site_visit_notes_retrieved: Option<DateTime<Utc>>,
    pub pw14: Pw14Checks,
    pub pw14_checks_complete: bool,
    pub confirmed_felling_and_restocking_complete: bool,
    pub larch_check_complete: bool,
    pub eia: EiaScreening,
    pub is_conditional: Option<bool>,
    pub conditions_sent_to_applicant: Option<DateTime<Utc>>,
    pub recommended_licence_duration_years: Option<u8>,
    pub recommendation_for_decision_public_register: Option<bool>,
    pub recommendation_reason: Option<String>,
    pub last_updated_by: UserId,
    pub last_updated_date: DateTime<Utc>,
}

impl WoodlandOfficerReview {
    pub fn new(application_id: ApplicationId, user: UserId, now: DateTime<Utc>) -> Self {
        Self {
            application_id,
            site_visit_not_needed: false,
            site_visit_artefacts_created: None,
            site_visit_notes_retrieved: None,
            pw14: Pw14Checks::default(),
            pw14_checks_complete: false,
            confirmed_felling_and_restocking_complete: false,
            larch_check_complete: false,
            eia: EiaScreening::default(),
            is_conditional: None,
            conditions_sent_to_applicant: None,
            recommended_licence_duration_years: None,
            recommendation_for_decision_public_register: None,
            recommendation_reason: None,
            last_updated_by: user,
            last_updated_date: now,
        }
    }

    pub fn touch(&mut self, user: UserId, now: DateTime<Utc>) {
        self.last_updated_by = user;
        self.last_updated_date = now;
    }
}

/// Statutory publication window tracked per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicRegister {
    pub application_id: ApplicationId,
    pub exempt_from_consultation: bool,
    pub exemption_reason: Option<String>,
    pub consultation_published: Option<DateTime<Utc>>,
    pub consultation_expires: Option<DateTime<Utc>>,
    pub removed: Option<DateTime<Utc>>,
}

impl PublicRegister {
    pub fn exempt(application_id: ApplicationId, reason: impl Into<String>) -> Self {
        Self {
            application_id,
            exempt_from_consultation: true,
            exemption_reason: Some(reason.into()),
            consultation_published: None,
            consultation_expires: None,
            removed: None,
        }
    }
}

/// Decision the approver records before the terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedDecision {
    Approve,
    Refuse,
    ReferToLocalAuthority,
}

/// Checklist state for the approver (field manager) stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproverReview {
    pub application_id: ApplicationId,
    pub checked_application: Option<bool>,
    pub checked_documentation: Option<bool>,
    pub checked_case_notes: Option<bool>,
    pub checked_woodland_officer_review: Option<bool>,
    pub requested_decision: Option<RecommendedDecision>,
    pub approved_licence_duration_years: Option<u8>,
    pub duration_change_reason: Option<String>,
    pub last_updated_by: UserId,
    pub last_updated_date: DateTime<Utc>,
}

/// Correction record for an application approved in error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedInError {
    pub application_id: ApplicationId,
    pub reason: String,
    pub reason_other: bool,
    pub previous_reference: Option<String>,
    pub last_updated_by: UserId,
    pub last_updated_date: DateTime<Utc>,
}

/// Phytophthora ramorum risk zone the property falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LarchZone {
    Zone1,
    Zone2,
    Zone3,
}

/// Larch-specific compliance checklist, only relevant when a felling detail
/// references a larch species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LarchCheckDetails {
    pub application_id: ApplicationId,
    pub zone: Option<LarchZone>,
    pub confirm_larch_only: Option<bool>,
    pub inside_moratorium_dates: Option<bool>,
    pub inspection_logged: Option<bool>,
    pub last_updated_by: UserId,
    pub last_updated_date: DateTime<Utc>,
}

impl LarchCheckDetails {
    pub fn any_started(&self) -> bool {
        self.zone.is_some()
            || self.confirm_larch_only.is_some()
            || self.inside_moratorium_dates.is_some()
            || self.inspection_logged.is_some()
    }
}
