//! Common type definitions shared across the matcher, trends, extraction and storage layers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`UserId`]: Account identifier, the owner of every other row
//! - [`ClientId`]: Patient client identifier
//! - [`AnalysisId`]: Stored lab analysis identifier
//! - [`BenchmarkId`]: Custom benchmark identifier
//!
//! # Value Types
//!
//! - [`Gender`]: Stored as the `gender` Postgres enum
//! - [`Biomarker`]: A single measured value inside an analysis (stored as JSONB)
//! - [`BiomarkerFlag`]: The low/normal/high flag reported by the lab
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ClientId = Uuid;
pub type AnalysisId = Uuid;
pub type BenchmarkId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Lenient parse of the gender spellings that show up on lab reports.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "m" | "male" | "man" => Some(Gender::Male),
            "f" | "female" | "woman" => Some(Gender::Female),
            "o" | "other" | "x" | "non-binary" | "nonbinary" => Some(Gender::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
            Gender::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BiomarkerFlag {
    Low,
    Normal,
    High,
}

impl BiomarkerFlag {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "l" | "low" | "lo" => Some(BiomarkerFlag::Low),
            "n" | "normal" | "ok" | "in range" => Some(BiomarkerFlag::Normal),
            "h" | "high" | "hi" => Some(BiomarkerFlag::High),
            _ => None,
        }
    }
}

/// A measured lab value, as stored in the `biomarkers` JSONB column of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Biomarker {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_min: Option<f64>,
    #[serde(default)]
    pub reference_max: Option<f64>,
    #[serde(default)]
    pub flag: Option<BiomarkerFlag>,
}
