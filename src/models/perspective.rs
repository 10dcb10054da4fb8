use crate::models::finding::Finding;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five scoring perspectives. Declaration order is the tie-break order
/// used when merging findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerspectiveId {
    User,
    Test,
    System,
    Analytics,
    Debug,
}

impl PerspectiveId {
    pub const ALL: [PerspectiveId; 5] = [
        PerspectiveId::User,
        PerspectiveId::Test,
        PerspectiveId::System,
        PerspectiveId::Analytics,
        PerspectiveId::Debug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PerspectiveId::User => "user",
            PerspectiveId::Test => "test",
            PerspectiveId::System => "system",
            PerspectiveId::Analytics => "analytics",
            PerspectiveId::Debug => "debug",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for PerspectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of a perspective before contract checks.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveOutcome {
    pub score: f64,
    pub findings: Vec<Finding>,
}

impl PerspectiveOutcome {
    pub fn new(score: f64, findings: Vec<Finding>) -> Self {
        Self { score, findings }
    }

    /// Score 0.0 with one CRITICAL finding demanding the missing artifact.
    pub fn missing(finding: Finding) -> Self {
        Self {
            score: 0.0,
            findings: vec![finding],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveResult {
    pub perspective: PerspectiveId,
    pub score: f64,
    pub findings: Vec<Finding>,
}
