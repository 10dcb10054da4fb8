use crate::models::history::CommitRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementStatus {
    Todo,
    Doing,
    Done,
}

impl IncrementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IncrementStatus::Todo => "todo",
            IncrementStatus::Doing => "doing",
            IncrementStatus::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Some(IncrementStatus::Todo),
            "doing" => Some(IncrementStatus::Doing),
            "done" => Some(IncrementStatus::Done),
            _ => None,
        }
    }

    /// Forward lifecycle steps only. Reverting `done -> todo` is a separate,
    /// explicit operation and is not a regular transition.
    pub fn can_advance_to(self, next: IncrementStatus) -> bool {
        matches!(
            (self, next),
            (IncrementStatus::Todo, IncrementStatus::Doing)
                | (IncrementStatus::Doing, IncrementStatus::Done)
        )
    }
}

impl fmt::Display for IncrementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipleRef {
    pub code: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Increment {
    pub id: u32,
    pub status: IncrementStatus,
    pub title: String,
    pub slug: String,
    pub requirement: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub principles: Vec<PrincipleRef>,
    pub path: PathBuf,
}

impl Increment {
    /// Zero-padded identifier as it appears in filenames and commit messages.
    pub fn label(&self) -> String {
        format!("{:04}", self.id)
    }

    /// `INCREMENT 0007: Knowledge Schema` built from the filename slug.
    pub fn commit_message(&self) -> String {
        format!("INCREMENT {:04}: {}", self.id, title_case_slug(&self.slug))
    }
}

pub(crate) fn title_case_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoInstruction {
    pub hash: String,
    pub timestamp: i64,
    pub message: String,
    pub command: String,
}

impl UndoInstruction {
    pub fn for_commit(commit: &CommitRecord) -> Self {
        Self {
            hash: commit.hash.clone(),
            timestamp: commit.timestamp,
            message: commit.summary().to_string(),
            command: format!("git revert --no-commit {}", commit.hash),
        }
    }
}

/// Reverse-chronological undo steps for one increment. Planning never
/// mutates the queue; `apply_revert` is the separate, explicit step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertPlan {
    pub id: u32,
    pub title: Option<String>,
    pub status: Option<IncrementStatus>,
    pub instructions: Vec<UndoInstruction>,
    pub commit_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertRangePlan {
    pub from: u32,
    pub to: u32,
    pub plans: Vec<RevertPlan>,
    pub commit_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrinciple {
    pub code: String,
    pub title: String,
    pub content: String,
}

/// Structured prompt data for one increment; text layout belongs to the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementPrompt {
    pub id: u32,
    pub title: String,
    pub requirement: String,
    pub status: IncrementStatus,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub principles: Vec<ResolvedPrinciple>,
    pub commit_message: String,
    pub needs_inspection: bool,
    pub progress: Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedoPlan {
    pub revert: RevertPlan,
    pub prompt: IncrementPrompt,
    pub commit_message: String,
    /// Redo never bypasses verification of the re-implementation.
    pub requires_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub id: u32,
    pub matching_commits: Vec<String>,
    pub previous: IncrementStatus,
    pub status: IncrementStatus,
}

impl Verification {
    pub fn completed(&self) -> bool {
        self.status == IncrementStatus::Done
    }
}
