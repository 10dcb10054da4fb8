use super::{fraction, mean, AnalysisContext, Perspective};
use crate::analysis::markers::marker_density;
use crate::models::finding::{Finding, Priority};
use crate::models::perspective::{PerspectiveId, PerspectiveOutcome};
use crate::models::snapshot::MarkerOccurrence;

const MARKER_TITLE_CHARS: usize = 50;
const DIRTY_TREE_SCORE: f64 = 0.5;

/// Unresolved-work markers, unparsable files and uncommitted changes.
pub struct DebugPerspective;

impl Perspective for DebugPerspective {
    fn id(&self) -> PerspectiveId {
        PerspectiveId::Debug
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> PerspectiveOutcome {
        let snapshot = ctx.snapshot;
        let settings = ctx.settings;

        if snapshot.total_files == 0 {
            return PerspectiveOutcome::missing(
                Finding::new(
                    Priority::Critical,
                    "Add source files",
                    "No recognised source files found to inspect for defects.",
                )
                .with_metric(0.0, 1.0)
                .with_criteria(["Add source files in a supported language"])
                .with_tags(["debug"]),
            );
        }

        let mut findings = Vec::new();

        let density = marker_density(snapshot.total_markers, snapshot.total_lines);
        let target = settings.marker_density_target;
        let mut components = vec![
            (1.0 - density / (2.0 * target)).max(0.0),
            1.0 - fraction(snapshot.parse_failures, snapshot.total_files),
        ];

        let mut markers: Vec<(&str, &MarkerOccurrence)> = snapshot
            .files
            .values()
            .flat_map(|f| f.markers.iter().map(move |m| (f.path.as_str(), m)))
            .collect();
        markers.sort_by_key(|(_, m)| m.priority);
        for (path, marker) in markers.into_iter().take(settings.max_marker_findings) {
            findings.push(marker_finding(path, marker));
        }

        if density > target {
            findings.push(
                Finding::new(
                    Priority::Medium,
                    "Reduce unresolved markers",
                    format!(
                        "{} markers across {} lines ({:.1} per 1000 lines).",
                        snapshot.total_markers, snapshot.total_lines, density
                    ),
                )
                .with_metric(density, target)
                .with_criteria([format!(
                    "Bring marker density to at most {} per 1000 lines",
                    target
                )])
                .with_tags(["debug"]),
            );
        }

        for file in snapshot.files.values() {
            let Some(failure) = &file.parse_error else {
                continue;
            };
            findings.push(
                Finding::new(
                    Priority::High,
                    format!("Fix syntax error in {}", file.path),
                    format!("{} fails to parse: {}", file.path, failure.message),
                )
                .at(&file.path, Some(failure.line))
                .with_criteria(["File parses without errors"])
                .with_tags(["syntax"]),
            );
        }

        if ctx.history.is_available() {
            let uncommitted = &ctx.history.uncommitted;
            if uncommitted.is_empty() {
                components.push(1.0);
            } else {
                components.push(DIRTY_TREE_SCORE);
                findings.push(
                    Finding::new(
                        Priority::Medium,
                        "Uncommitted changes detected",
                        format!("{} files have uncommitted changes.", uncommitted.len()),
                    )
                    .with_metric(uncommitted.len() as f64, 0.0)
                    .with_criteria(["Review and commit changes", "Or stash if work in progress"])
                    .with_tags(["git"]),
                );
            }
        }

        PerspectiveOutcome::new(mean(&components), findings)
    }
}

fn marker_finding(path: &str, marker: &MarkerOccurrence) -> Finding {
    let detail = marker
        .text
        .split_once(marker.keyword.as_str())
        .map(|(_, rest)| rest)
        .unwrap_or(&marker.text)
        .trim_start_matches([':', ' ', '-', '('])
        .trim();
    let summary: String = detail.chars().take(MARKER_TITLE_CHARS).collect();

    Finding::new(
        marker.priority,
        format!("{}: {}", marker.keyword, summary),
        format!("Found in {}:{}", path, marker.line),
    )
    .at(path, Some(marker.line))
    .with_criteria([
        format!("Address the {} comment", marker.keyword),
        "Remove or update the comment after resolution".to_string(),
    ])
    .with_tags([marker.keyword.to_lowercase()])
}
