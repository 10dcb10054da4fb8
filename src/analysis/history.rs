use crate::models::history::{
    CommitKind, CommitRecord, DriftCommit, DriftEvent, HistoryAvailability, HistoryReport,
};
use git2::{Commit, DiffFormat, DiffOptions, Repository, StatusOptions};
use std::collections::BTreeMap;
use std::path::Path;

/// Engine-owned directory excluded from working-tree change detection.
pub const ENGINE_DIR: &str = ".selfdev";

const CORRECTIVE_WORDS: [&str; 8] = [
    "fix", "fixes", "fixed", "fixing", "bug", "bugs", "bugfix", "hotfix",
];
const GENERATIVE_WORDS: [&str; 9] = [
    "feat", "feature", "features", "add", "adds", "added", "implement", "implements",
    "implemented",
];

#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    /// Oldest commit time (unix seconds) to include.
    pub since: Option<i64>,
    pub limit: usize,
    pub tracked_documents: Vec<String>,
    pub document_checks: BTreeMap<String, i64>,
    pub excerpt_lines: usize,
    /// Newest commit already seen by an advancing run. Drift keeps walking
    /// past `limit` down to this commit, and never includes it or older.
    pub resume_from: Option<String>,
}

/// Walk HEAD newest-first and collect commits, document drift and
/// working-tree changes. Never fails: a missing repository or unreadable
/// HEAD yields `HistoryReport::unavailable`.
pub fn analyze_history(root: &Path, options: &HistoryOptions) -> HistoryReport {
    let repo = match Repository::open(root) {
        Ok(repo) => repo,
        Err(e) => {
            log::warn!("no git repository at {}: {}", root.display(), e.message());
            return HistoryReport::unavailable(format!("not a git repository: {}", e.message()));
        }
    };

    match collect(&repo, options) {
        Ok(report) => report,
        Err(e) => {
            log::warn!("git history unreadable at {}: {}", root.display(), e.message());
            HistoryReport::unavailable(format!("history unreadable: {}", e.message()))
        }
    }
}

fn collect(repo: &Repository, options: &HistoryOptions) -> Result<HistoryReport, git2::Error> {
    repo.head()?;

    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    revwalk.set_sorting(git2::Sort::TIME)?;

    let mut commits = Vec::new();
    let mut drift: BTreeMap<String, Vec<DriftCommit>> = BTreeMap::new();
    let resume = options.resume_from.as_deref();
    let mut resumed = false;

    for oid in revwalk.flatten() {
        let hash = oid.to_string();
        if resume == Some(hash.as_str()) {
            resumed = true;
        }
        let collecting = commits.len() < options.limit;
        let drifting = !resumed
            && !options.tracked_documents.is_empty()
            && (collecting || resume.is_some());
        if !collecting && !drifting {
            break;
        }
        let commit = match repo.find_commit(oid) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let timestamp = commit.time().seconds();
        if options.since.is_some_and(|since| timestamp < since) {
            break;
        }

        let files = touched_files(repo, &commit).unwrap_or_default();
        let message = commit.message().unwrap_or("").to_string();

        let documents: &[String] = if drifting { &options.tracked_documents } else { &[] };
        for document in documents {
            if !files.iter().any(|f| f == document) {
                continue;
            }
            let checked = options.document_checks.get(document).copied();
            if checked.is_some_and(|at| timestamp <= at) {
                continue;
            }
            let excerpt = document_excerpt(repo, &commit, document, options.excerpt_lines)
                .unwrap_or_default();
            drift.entry(document.clone()).or_default().push(DriftCommit {
                hash: hash.clone(),
                timestamp,
                message: message.lines().next().unwrap_or("").trim().to_string(),
                excerpt,
            });
        }

        if !collecting {
            continue;
        }
        log::debug!("commit {} touches {} files", hash, files.len());
        commits.push(CommitRecord {
            hash,
            timestamp,
            author: commit.author().name().unwrap_or("unknown").to_string(),
            kind: classify_commit(&message),
            message,
            files,
        });
    }

    let drift = drift
        .into_iter()
        .map(|(document, commits)| DriftEvent {
            last_checked: options.document_checks.get(&document).copied(),
            document,
            commits,
        })
        .collect();

    Ok(HistoryReport {
        availability: HistoryAvailability::Available,
        commits,
        drift,
        uncommitted: uncommitted_paths(repo),
    })
}

fn touched_files(repo: &Repository, commit: &Commit<'_>) -> Result<Vec<String>, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    let mut files: Vec<String> = diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Up to `max_lines` added/removed lines of `document` in `commit`.
fn document_excerpt(
    repo: &Repository,
    commit: &Commit<'_>,
    document: &str,
    max_lines: usize,
) -> Result<Vec<String>, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
    let mut opts = DiffOptions::new();
    opts.pathspec(document);
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

    let mut excerpt = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let origin = line.origin();
        if excerpt.len() < max_lines && (origin == '+' || origin == '-') {
            let content = String::from_utf8_lossy(line.content());
            excerpt.push(format!("{}{}", origin, content.trim_end()));
        }
        true
    })?;
    Ok(excerpt)
}

fn uncommitted_paths(repo: &Repository) -> Vec<String> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(false)
        .recurse_untracked_dirs(true);

    let statuses = match repo.statuses(Some(&mut opts)) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("git status failed: {}", e.message());
            return Vec::new();
        }
    };

    let engine_prefix = format!("{}/", ENGINE_DIR);
    let mut paths: Vec<String> = statuses
        .iter()
        .filter(|entry| entry.status() != git2::Status::CURRENT)
        .filter_map(|entry| entry.path().map(|p| p.to_string()))
        .filter(|p| !p.starts_with(&engine_prefix) && p != ENGINE_DIR)
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Corrective vocabulary wins over generative; anything else is neutral.
pub fn classify_commit(message: &str) -> CommitKind {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| CORRECTIVE_WORDS.contains(w)) {
        CommitKind::Corrective
    } else if words.iter().any(|w| GENERATIVE_WORDS.contains(w)) {
        CommitKind::Generative
    } else {
        CommitKind::Neutral
    }
}

/// Share of corrective commits among the newest `window` commits.
/// `None` without commits.
pub fn fix_ratio(commits: &[CommitRecord], window: usize) -> Option<f64> {
    let recent: Vec<&CommitRecord> = commits.iter().take(window.max(1)).collect();
    if recent.is_empty() {
        return None;
    }
    let corrective = recent
        .iter()
        .filter(|c| c.kind == CommitKind::Corrective)
        .count();
    Some(corrective as f64 / recent.len() as f64)
}
