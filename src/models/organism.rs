use crate::models::perspective::PerspectiveId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentStage {
    Embryonic,
    Growth,
    Maturation,
    Homeostasis,
}

impl DevelopmentStage {
    pub fn from_generation(generation: u64) -> Self {
        match generation {
            0..=3 => DevelopmentStage::Embryonic,
            4..=10 => DevelopmentStage::Growth,
            11..=20 => DevelopmentStage::Maturation,
            _ => DevelopmentStage::Homeostasis,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DevelopmentStage::Embryonic => "embryonic",
            DevelopmentStage::Growth => "growth",
            DevelopmentStage::Maturation => "maturation",
            DevelopmentStage::Homeostasis => "homeostasis",
        }
    }
}

impl fmt::Display for DevelopmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub generation: u64,
    pub overall: f64,
    #[serde(default)]
    pub timestamp: String,
    /// Rounded per-perspective scores of this generation.
    #[serde(default)]
    pub scores: BTreeMap<PerspectiveId, f64>,
}

/// The persisted evolutionary record. The development stage is derived
/// from `generation` and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganismState {
    pub generation: u64,
    pub fitness_scores: BTreeMap<PerspectiveId, f64>,
    pub fitness_history: Vec<FitnessRecord>,
    pub document_checks: BTreeMap<String, i64>,
    /// Newest commit seen by the last advancing run.
    pub last_git_hash: Option<String>,
    pub created_at: Option<String>,
    pub last_updated: Option<String>,
}

impl OrganismState {
    pub fn stage(&self) -> DevelopmentStage {
        DevelopmentStage::from_generation(self.generation)
    }

    pub fn last_checked(&self, document: &str) -> Option<i64> {
        self.document_checks.get(document).copied()
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateExport {
    pub state: OrganismState,
    pub stage: DevelopmentStage,
}
