use crate::analysis::perspectives::{perspective_for, run_perspective, AnalysisContext};
use crate::analysis::ranking::{count_by_priority, rank_findings, RankedFinding};
use crate::commands::git::load_history;
use crate::commands::scan::scan_codebase;
use crate::commands::settings::load_settings;
use crate::commands::state::{mark_documents_checked, record_generation, GenerationOutcome, OrganismStateStore};
use crate::error::Result;
use crate::models::finding::Priority;
use crate::models::history::HistoryAvailability;
use crate::models::organism::StateExport;
use crate::models::perspective::{PerspectiveId, PerspectiveResult};
use crate::models::snapshot::CodebaseSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub root: PathBuf,
    /// Perspectives to run, in any order. Empty runs all five.
    pub perspectives: Vec<PerspectiveId>,
    pub advance_generation: bool,
    /// Ignore commits older than this unix timestamp.
    pub since: Option<i64>,
}

impl AnalysisRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            perspectives: Vec::new(),
            advance_generation: false,
            since: None,
        }
    }

    pub fn advancing(mut self) -> Self {
        self.advance_generation = true;
        self
    }

    fn selected(&self) -> Vec<PerspectiveId> {
        if self.perspectives.is_empty() {
            return PerspectiveId::ALL.to_vec();
        }
        let mut ids = self.perspectives.clone();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub total_files: usize,
    pub total_lines: usize,
    pub test_files: usize,
    pub oversized_files: usize,
    pub complex_files: usize,
    pub parse_failures: usize,
    pub total_markers: usize,
}

impl From<&CodebaseSnapshot> for SnapshotSummary {
    fn from(snapshot: &CodebaseSnapshot) -> Self {
        Self {
            total_files: snapshot.total_files,
            total_lines: snapshot.total_lines,
            test_files: snapshot.test_files,
            oversized_files: snapshot.oversized_files,
            complex_files: snapshot.complex_files,
            parse_failures: snapshot.parse_failures,
            total_markers: snapshot.total_markers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub ranked: Vec<RankedFinding>,
    pub results: Vec<PerspectiveResult>,
    pub snapshot: SnapshotSummary,
    pub history: HistoryAvailability,
    pub generation: Option<GenerationOutcome>,
}

impl AnalysisReport {
    pub fn score(&self, perspective: PerspectiveId) -> Option<f64> {
        self.results
            .iter()
            .find(|r| r.perspective == perspective)
            .map(|r| r.score)
    }
}

/// Full pipeline: settings and state, scan, history, perspectives, ranking.
///
/// Only an advancing run touches disk, and it saves the state exactly once
/// after every perspective has succeeded. A contract violation in any
/// perspective aborts the run before anything is written.
pub fn run_analysis(request: &AnalysisRequest) -> Result<AnalysisReport> {
    let start = std::time::Instant::now();
    let root = request.root.as_path();
    let settings = load_settings(root);
    let store = OrganismStateStore::new(root);
    let mut state = store.load();

    let snapshot = scan_codebase(root, &settings);
    let history = load_history(root, &settings, &state, request.since);

    let results = {
        let ctx = AnalysisContext {
            root,
            snapshot: &snapshot,
            history: &history,
            state: &state,
            settings: &settings,
        };
        request
            .selected()
            .into_iter()
            .map(|id| run_perspective(perspective_for(id).as_ref(), &ctx))
            .collect::<Result<Vec<PerspectiveResult>>>()?
    };
    let ranked = rank_findings(&results);

    let generation = if request.advance_generation {
        let scores: BTreeMap<PerspectiveId, f64> =
            results.iter().map(|r| (r.perspective, r.score)).collect();
        let timestamp = chrono::Utc::now().to_rfc3339();
        let outcome = record_generation(&mut state, &scores, &timestamp)?;
        mark_documents_checked(&mut state, &history.drift);
        if let Some(head) = history.commits.first() {
            state.last_git_hash = Some(head.hash.clone());
        }
        store.save(&state)?;
        Some(outcome)
    } else {
        None
    };

    log::info!(
        "analysis of {} finished in {}ms: {} findings ({} critical, {} high)",
        root.display(),
        start.elapsed().as_millis(),
        ranked.len(),
        count_by_priority(&ranked, Priority::Critical),
        count_by_priority(&ranked, Priority::High)
    );

    Ok(AnalysisReport {
        ranked,
        results,
        snapshot: SnapshotSummary::from(&snapshot),
        history: history.availability,
        generation,
    })
}

/// Static metrics only; nothing is written.
pub fn scan(root: &Path) -> CodebaseSnapshot {
    scan_codebase(root, &load_settings(root))
}

pub fn export_state(root: &Path) -> StateExport {
    let state = OrganismStateStore::new(root).load();
    StateExport {
        stage: state.stage(),
        state,
    }
}
