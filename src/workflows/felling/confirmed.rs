//! Proposed versus confirmed felling and restocking details. Proposed
//! records come from the applicant; confirmed records are what the woodland
//! officer actually agrees per compartment. Species reconciliation is a set
//! difference over maps keyed by species code rather than in-place mutation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::ApplicationId;

/// Species codes treated as larch for the larch check stage.
pub const LARCH_SPECIES_CODES: [&str; 3] = ["EL", "HL", "JL"];

/// Felling operation agreed or proposed for a compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FellingOperationType {
    ClearFelling,
    FellingOfCoppice,
    FellingIndividualTrees,
    RegenerationFelling,
    Thinning,
    Deforestation,
}

/// How a felled compartment will be restocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockingProposal {
    ReplantFelledArea,
    RestockAlternativeArea,
    NaturalRegeneration,
    DoNotIntendToRestock,
}

/// Species entry on a felling detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FellingSpecies {
    pub species_code: String,
}

/// Species entry on a restocking detail, with the share of the restocked
/// area it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestockingSpecies {
    pub species_code: String,
    pub percentage: Option<f64>,
}

/// Applicant-proposed felling for one compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedFellingDetail {
    pub application_id: ApplicationId,
    pub compartment_id: Uuid,
    pub operation_type: FellingOperationType,
    pub area_hectares: f64,
    pub species: Vec<FellingSpecies>,
}

/// Officer-confirmed felling for one compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedFellingDetail {
    pub application_id: ApplicationId,
    pub compartment_id: Uuid,
    pub operation_type: FellingOperationType,
    pub area_hectares: f64,
    pub estimated_total_felling_volume: Option<f64>,
    pub species: Vec<FellingSpecies>,
}

/// Officer-confirmed restocking for one compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedRestockingDetail {
    pub application_id: ApplicationId,
    pub compartment_id: Uuid,
    pub proposal: RestockingProposal,
    pub area_hectares: f64,
    pub species: Vec<RestockingSpecies>,
}

fn is_larch(code: &str) -> bool {
    LARCH_SPECIES_CODES
        .iter()
        .any(|larch| larch.eq_ignore_ascii_case(code))
}

/// Whether any proposed or confirmed felling detail references a larch
/// species. Drives the larch check stage being required at all.
pub fn references_larch(
    proposed: &[ProposedFellingDetail],
    confirmed: &[ConfirmedFellingDetail],
) -> bool {
    proposed
        .iter()
        .flat_map(|detail| detail.species.iter())
        .chain(confirmed.iter().flat_map(|detail| detail.species.iter()))
        .any(|species| is_larch(&species.species_code))
}

/// Whether any felling detail indicates deforestation, which brings the
/// application under EIA screening.
pub fn requires_eia_screening(
    proposed: &[ProposedFellingDetail],
    confirmed: &[ConfirmedFellingDetail],
) -> bool {
    proposed
        .iter()
        .any(|detail| detail.operation_type == FellingOperationType::Deforestation)
        || confirmed
            .iter()
            .any(|detail| detail.operation_type == FellingOperationType::Deforestation)
}

/// Outcome of diffing a confirmed species list against the desired map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesDelta {
    pub additions: Vec<RestockingSpecies>,
    pub removals: Vec<String>,
    pub updates: Vec<RestockingSpecies>,
}

impl SpeciesDelta {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.updates.is_empty()
    }
}

/// Compute additions, removals, and percentage updates needed to bring the
/// current species list in line with the desired map.
pub fn reconcile_species(
    current: &[RestockingSpecies],
    desired: &BTreeMap<String, Option<f64>>,
) -> SpeciesDelta {
    let mut delta = SpeciesDelta::default();

    let existing: BTreeMap<&str, &RestockingSpecies> = current
        .iter()
        .map(|species| (species.species_code.as_str(), species))
        .collect();

    for (code, percentage) in desired {
        match existing.get(code.as_str()) {
            None => delta.additions.push(RestockingSpecies {
                species_code: code.clone(),
                percentage: *percentage,
            }),
            Some(species) if species.percentage != *percentage => {
                delta.updates.push(RestockingSpecies {
                    species_code: code.clone(),
                    percentage: *percentage,
                });
            }
            Some(_) => {}
        }
    }

    for species in current {
        if !desired.contains_key(&species.species_code) {
            delta.removals.push(species.species_code.clone());
        }
    }

    delta
}

/// Apply a reconciliation, producing the new species list sorted by code.
pub fn apply_species(desired: &BTreeMap<String, Option<f64>>) -> Vec<RestockingSpecies> {
    desired
        .iter()
        .map(|(code, percentage)| RestockingSpecies {
            species_code: code.clone(),
            percentage: *percentage,
        })
        .collect()
}
