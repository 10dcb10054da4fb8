use crate::analysis::history::{analyze_history, HistoryOptions};
use crate::commands::settings::EngineSettings;
use crate::models::history::HistoryReport;
use crate::models::organism::OrganismState;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

impl HistoryOptions {
    pub fn from_settings(settings: &EngineSettings, state: &OrganismState, since: Option<i64>) -> Self {
        Self {
            since,
            limit: settings.history_limit,
            tracked_documents: settings.tracked_documents.clone(),
            document_checks: state.document_checks.clone(),
            excerpt_lines: settings.excerpt_lines,
            resume_from: state.last_git_hash.clone(),
        }
    }
}

/// Run the history scan on a worker thread and give up after `timeout`.
/// A scan that times out or dies degrades to an unavailable report; the
/// abandoned worker finishes on its own.
pub fn load_history_bounded(root: &Path, options: HistoryOptions, timeout: Duration) -> HistoryReport {
    let (tx, rx) = mpsc::channel();
    let root: PathBuf = root.to_path_buf();

    std::thread::spawn(move || {
        let report = analyze_history(&root, &options);
        let _ = tx.send(report);
    });

    match rx.recv_timeout(timeout) {
        Ok(report) => {
            log::info!(
                "history: {} commits, {} drifted documents, {} uncommitted paths",
                report.commits.len(),
                report.drift.len(),
                report.uncommitted.len()
            );
            report
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            log::warn!("git history scan exceeded {}s, continuing without it", timeout.as_secs());
            HistoryReport::unavailable(format!(
                "history scan exceeded {} seconds",
                timeout.as_secs()
            ))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            log::warn!("git history worker stopped without a result");
            HistoryReport::unavailable("history scan failed")
        }
    }
}

/// History for `root` with limits and document checks taken from settings.
pub fn load_history(
    root: &Path,
    settings: &EngineSettings,
    state: &OrganismState,
    since: Option<i64>,
) -> HistoryReport {
    load_history_bounded(
        root,
        HistoryOptions::from_settings(settings, state, since),
        Duration::from_secs(settings.git_timeout_secs),
    )
}
