//! Completion gate evaluator for the Woodland Officer Review. Pure
//! classification over the loaded aggregates; no persistence, no clock
//! access beyond the `now` handed in.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::confirmed::{
    references_larch, requires_eia_screening, ConfirmedFellingDetail, ConfirmedRestockingDetail,
    ProposedFellingDetail,
};
use super::review::{LarchCheckDetails, PublicRegister, WoodlandOfficerReview};

/// Classification of one review stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCompletion {
    CannotStartYet,
    NotStarted,
    InProgress,
    Completed,
    NotRequired,
}

impl StageCompletion {
    pub const fn label(self) -> &'static str {
        match self {
            Self::CannotStartYet => "Cannot Start Yet",
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::NotRequired => "Not Required",
        }
    }
}

/// Everything the evaluator needs, borrowed from the caller's loads. An
/// absent review means nothing below has started.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub review: Option<&'a WoodlandOfficerReview>,
    pub public_register: Option<&'a PublicRegister>,
    pub larch_details: Option<&'a LarchCheckDetails>,
    pub proposed_felling: &'a [ProposedFellingDetail],
    pub confirmed_felling: &'a [ConfirmedFellingDetail],
    pub confirmed_restocking: &'a [ConfirmedRestockingDetail],
}

/// Per-stage classifications for the review task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub public_register: StageCompletion,
    pub site_visit: StageCompletion,
    pub pw14_checks: StageCompletion,
    pub felling_and_restocking: StageCompletion,
    pub conditions: StageCompletion,
    pub larch_check: StageCompletion,
}

impl GateReport {
    /// Overall gate: every stage that applies must be completed.
    pub fn all_required_complete(&self) -> bool {
        [
            self.public_register,
            self.site_visit,
            self.pw14_checks,
            self.felling_and_restocking,
            self.conditions,
            self.larch_check,
        ]
        .into_iter()
        .all(|stage| matches!(stage, StageCompletion::Completed | StageCompletion::NotRequired))
    }
}

impl<'a> GateContext<'a> {
    pub fn report(&self, now: DateTime<Utc>) -> GateReport {
        GateReport {
            public_register: self.public_register_stage(now),
            site_visit: self.site_visit_stage(),
            pw14_checks: self.pw14_stage(),
            felling_and_restocking: self.felling_and_restocking_stage(),
            conditions: self.conditions_stage(),
            larch_check: self.larch_stage(),
        }
    }

    /// Completed once exempted, or published and either expired or removed.
    pub fn public_register_stage(&self, now: DateTime<Utc>) -> StageCompletion {
        let Some(register) = self.public_register else {
            return StageCompletion::NotStarted;
        };

        if register.exempt_from_consultation {
            return StageCompletion::Completed;
        }

        match register.consultation_published {
            Some(_) => {
                let expired = register
                    .consultation_expires
                    .is_some_and(|expires| expires <= now);
                if expired || register.removed.is_some() {
                    StageCompletion::Completed
                } else {
                    StageCompletion::InProgress
                }
            }
            None => StageCompletion::NotStarted,
        }
    }

    pub fn site_visit_stage(&self) -> StageCompletion {
        let Some(review) = self.review else {
            return StageCompletion::NotStarted;
        };

        if review.site_visit_not_needed {
            return StageCompletion::Completed;
        }

        match (
            review.site_visit_artefacts_created,
            review.site_visit_notes_retrieved,
        ) {
            (Some(_), Some(_)) => StageCompletion::Completed,
            (Some(_), None) => StageCompletion::InProgress,
            _ => StageCompletion::NotStarted,
        }
    }

    pub fn pw14_stage(&self) -> StageCompletion {
        let Some(review) = self.review else {
            return StageCompletion::NotStarted;
        };

        if review.pw14_checks_complete {
            StageCompletion::Completed
        } else if review.pw14.any_started() {
            StageCompletion::InProgress
        } else {
            StageCompletion::NotStarted
        }
    }

    /// Confirmed felling and restocking needs both records and the explicit
    /// completion flag.
    pub fn felling_and_restocking_stage(&self) -> StageCompletion {
        let complete = self
            .review
            .is_some_and(|review| review.confirmed_felling_and_restocking_complete);

        if complete {
            StageCompletion::Completed
        } else if !self.confirmed_felling.is_empty() || !self.confirmed_restocking.is_empty() {
            StageCompletion::InProgress
        } else {
            StageCompletion::NotStarted
        }
    }

    pub fn conditions_stage(&self) -> StageCompletion {
        let Some(review) = self.review else {
            return StageCompletion::NotStarted;
        };

        match review.is_conditional {
            None => StageCompletion::NotStarted,
            Some(false) => StageCompletion::Completed,
            Some(true) => {
                if review.conditions_sent_to_applicant.is_some() {
                    StageCompletion::Completed
                } else {
                    StageCompletion::InProgress
                }
            }
        }
    }

    pub fn larch_stage(&self) -> StageCompletion {
        if !references_larch(self.proposed_felling, self.confirmed_felling) {
            return StageCompletion::NotRequired;
        }

        let felling_confirmed = self
            .review
            .is_some_and(|review| review.confirmed_felling_and_restocking_complete);
        if !felling_confirmed {
            return StageCompletion::CannotStartYet;
        }

        if self.review.is_some_and(|review| review.larch_check_complete) {
            StageCompletion::Completed
        } else if self
            .larch_details
            .is_some_and(LarchCheckDetails::any_started)
        {
            StageCompletion::InProgress
        } else {
            StageCompletion::NotStarted
        }
    }

    /// EIA screening is required when any felling detail indicates
    /// deforestation. It never appears on the task list; it only blocks the
    /// overall completion operation.
    pub fn eia_screening_required(&self) -> bool {
        requires_eia_screening(self.proposed_felling, self.confirmed_felling)
    }

    pub fn eia_screening_satisfied(&self) -> bool {
        !self.eia_screening_required()
            || self.review.is_some_and(|review| review.eia.screening_complete)
    }
}
