//! Client matching: decide whether an extracted patient is one of the user's existing clients.
//!
//! Each stored client is scored against the extracted candidate with a weighted average of name
//! similarity (0.6), date of birth (0.3) and gender (0.1). Attributes missing on either side are
//! left out of the average rather than counted as a mismatch, so a report without a DOB can still
//! produce a confident name match, but never a [`Confidence::High`] one: that tier requires the
//! dates of birth to agree exactly.
//!
//! The outcome carries the ranked candidates and a [`MatchDecision`] telling the upload flow
//! whether it may attach the analysis without asking (a single unambiguous high-confidence
//! candidate), should ask the user to confirm, or should propose a new client.

mod similarity;

pub use similarity::{levenshtein, levenshtein_ratio, name_similarity, normalize_name};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

use crate::types::{ClientId, Gender};

const NAME_WEIGHT: f64 = 0.6;
const DOB_WEIGHT: f64 = 0.3;
const GENDER_WEIGHT: f64 = 0.1;

/// What was extracted from the report (or typed in by the user) about the patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MatchCandidate {
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

/// The attributes of a stored client the matcher looks at.
#[derive(Debug, Clone, Copy)]
pub struct ClientRecord<'a> {
    pub id: ClientId,
    pub name: &'a str,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Score cut-offs for the confidence tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchThresholds {
    /// Minimum score for [`Confidence::High`] (also requires an exact DOB match)
    pub high: f64,
    /// Minimum score for [`Confidence::Medium`]
    pub medium: f64,
    /// Clients scoring below this are not returned at all
    pub candidate_floor: f64,
    /// Maximum number of candidates returned
    pub max_candidates: usize,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            high: 0.90,
            medium: 0.70,
            candidate_floor: 0.50,
            max_candidates: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// How a single attribute compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMatch {
    Match,
    Mismatch,
    /// Day and month transposed (DOB only), a common transcription error
    Swapped,
    /// Missing on one side or both
    Unknown,
}

impl AttributeMatch {
    fn score(self) -> Option<f64> {
        match self {
            AttributeMatch::Match => Some(1.0),
            AttributeMatch::Swapped => Some(0.5),
            AttributeMatch::Mismatch => Some(0.0),
            AttributeMatch::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientMatch {
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    pub client_name: String,
    /// Weighted score in `[0, 1]`
    pub score: f64,
    pub confidence: Confidence,
    pub name_similarity: f64,
    pub dob: AttributeMatch,
    pub gender: AttributeMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MatchDecision {
    /// Exactly one high-confidence candidate: safe to attach without asking
    AutoAccept {
        #[schema(value_type = String, format = "uuid")]
        client_id: ClientId,
    },
    /// Candidates exist but the user has to pick (or reject) one
    Confirm,
    /// Nothing similar enough: propose creating a new client
    NewClient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MatchOutcome {
    pub decision: MatchDecision,
    pub candidates: Vec<ClientMatch>,
}

fn compare_dob(candidate: Option<NaiveDate>, record: Option<NaiveDate>) -> AttributeMatch {
    match (candidate, record) {
        (Some(a), Some(b)) if a == b => AttributeMatch::Match,
        (Some(a), Some(b)) if a.year() == b.year() && a.month() == b.day() && a.day() == b.month() => AttributeMatch::Swapped,
        (Some(_), Some(_)) => AttributeMatch::Mismatch,
        _ => AttributeMatch::Unknown,
    }
}

fn compare_gender(candidate: Option<Gender>, record: Option<Gender>) -> AttributeMatch {
    match (candidate, record) {
        (Some(a), Some(b)) if a == b => AttributeMatch::Match,
        (Some(_), Some(_)) => AttributeMatch::Mismatch,
        _ => AttributeMatch::Unknown,
    }
}

/// Score one stored client against the candidate.
pub fn score_client(candidate: &MatchCandidate, record: &ClientRecord<'_>, thresholds: &MatchThresholds) -> ClientMatch {
    let name_sim = name_similarity(&candidate.name, record.name);
    let dob = compare_dob(candidate.date_of_birth, record.date_of_birth);
    let gender = compare_gender(candidate.gender, record.gender);

    let mut weighted = NAME_WEIGHT * name_sim;
    let mut total_weight = NAME_WEIGHT;
    if let Some(s) = dob.score() {
        weighted += DOB_WEIGHT * s;
        total_weight += DOB_WEIGHT;
    }
    if let Some(s) = gender.score() {
        weighted += GENDER_WEIGHT * s;
        total_weight += GENDER_WEIGHT;
    }
    let score = (weighted / total_weight).clamp(0.0, 1.0);

    let confidence = if dob == AttributeMatch::Mismatch {
        Confidence::Low
    } else if score >= thresholds.high && dob == AttributeMatch::Match {
        Confidence::High
    } else if score >= thresholds.medium {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    ClientMatch {
        client_id: record.id,
        client_name: record.name.to_string(),
        score,
        confidence,
        name_similarity: name_sim,
        dob,
        gender,
    }
}

/// Rank the user's clients against the candidate and decide what the upload flow should do.
pub fn match_clients(candidate: &MatchCandidate, records: &[ClientRecord<'_>], thresholds: &MatchThresholds) -> MatchOutcome {
    let mut candidates: Vec<ClientMatch> = records
        .iter()
        .map(|record| score_client(candidate, record, thresholds))
        .filter(|m| m.score >= thresholds.candidate_floor)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.client_name.to_lowercase().cmp(&b.client_name.to_lowercase()))
            .then_with(|| a.client_id.cmp(&b.client_id))
    });
    candidates.truncate(thresholds.max_candidates);

    let high_count = candidates.iter().filter(|m| m.confidence == Confidence::High).count();
    let decision = match candidates.first() {
        Some(top) if top.confidence == Confidence::High && high_count == 1 => MatchDecision::AutoAccept { client_id: top.client_id },
        Some(_) => MatchDecision::Confirm,
        None => MatchDecision::NewClient,
    };

    MatchOutcome { decision, candidates }
}

impl Ord for Confidence {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(c: &Confidence) -> u8 {
            match c {
                Confidence::High => 2,
                Confidence::Medium => 1,
                Confidence::Low => 0,
            }
        }
        rank(self).cmp(&rank(other))
    }
}

impl PartialOrd for Confidence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
