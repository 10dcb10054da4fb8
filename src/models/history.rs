use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    Corrective,
    Generative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub timestamp: i64,
    pub author: String,
    pub message: String,
    pub files: Vec<String>,
    pub kind: CommitKind,
}

impl CommitRecord {
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftCommit {
    pub hash: String,
    pub timestamp: i64,
    pub message: String,
    pub excerpt: Vec<String>,
}

/// A tracked foundational document changed since it was last incorporated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub document: String,
    pub last_checked: Option<i64>,
    pub commits: Vec<DriftCommit>,
}

impl DriftEvent {
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.commits.iter().map(|c| c.timestamp).max()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HistoryAvailability {
    Available,
    Unavailable { reason: String },
}

/// Commit history, document drift and working-tree state for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryReport {
    pub availability: HistoryAvailability,
    pub commits: Vec<CommitRecord>,
    pub drift: Vec<DriftEvent>,
    pub uncommitted: Vec<String>,
}

impl HistoryReport {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            availability: HistoryAvailability::Unavailable {
                reason: reason.into(),
            },
            commits: Vec::new(),
            drift: Vec::new(),
            uncommitted: Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.availability, HistoryAvailability::Available)
    }
}
