use super::{AnalysisContext, Perspective};
use crate::analysis::coverage::TestPairing;
use crate::models::finding::{Finding, Priority};
use crate::models::perspective::{PerspectiveId, PerspectiveOutcome};

const LOW_RATIO: f64 = 0.5;

/// Test presence and pairing as a proxy for coverage. Tests are never run.
pub struct TestPerspective;

impl Perspective for TestPerspective {
    fn id(&self) -> PerspectiveId {
        PerspectiveId::Test
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> PerspectiveOutcome {
        let snapshot = ctx.snapshot;
        let settings = ctx.settings;
        let sources: Vec<_> = snapshot.source_files().collect();
        let inline_count = sources.iter().filter(|f| f.has_inline_tests).count();
        let test_count = snapshot.test_files + inline_count;

        if test_count == 0 {
            return PerspectiveOutcome::missing(
                Finding::new(
                    Priority::Critical,
                    "Create tests",
                    format!(
                        "No tests found for {} source files. Tests are essential for code quality.",
                        sources.len()
                    ),
                )
                .with_metric(0.0, sources.len() as f64)
                .with_criteria([
                    "Create a tests/ directory",
                    "Add at least one test file",
                    "Configure a test runner",
                ])
                .with_tags(["testing"]),
            );
        }

        let ratio = if sources.is_empty() {
            1.0
        } else {
            test_count as f64 / sources.len() as f64
        };

        let mut findings = Vec::new();
        if ratio < LOW_RATIO {
            findings.push(
                Finding::new(
                    Priority::High,
                    "Increase test coverage",
                    format!(
                        "Only {} test files and {} inline test modules for {} source files.",
                        snapshot.test_files,
                        inline_count,
                        sources.len()
                    ),
                )
                .with_metric(ratio * 100.0, settings.coverage_target)
                .with_criteria([
                    format!(
                        "Add tests for {} more modules",
                        sources.len().saturating_sub(test_count).max(1)
                    ),
                    "Achieve at least 50% file coverage".to_string(),
                ])
                .with_tags(["testing"]),
            );
        }

        let pairing = TestPairing::from_snapshot(snapshot);
        let mut untested_complex = 0usize;
        for file in &sources {
            let complexity = file.max_complexity();
            if complexity <= settings.max_function_complexity || pairing.is_tested(file) {
                continue;
            }
            untested_complex += 1;
            findings.push(
                Finding::new(
                    Priority::High,
                    format!("Add tests for {}", file.path),
                    format!("Complex file (complexity={}) lacks tests.", complexity),
                )
                .at(&file.path, None)
                .with_metric(complexity as f64, settings.max_function_complexity as f64)
                .with_criteria([
                    "Create corresponding test file",
                    "Test main functions",
                    "Include edge cases",
                ])
                .with_tags(["testing"]),
            );
        }

        let penalty = if sources.is_empty() {
            0.0
        } else {
            0.5 * untested_complex as f64 / sources.len() as f64
        };
        let score = ratio.min(1.0) * (1.0 - penalty);

        PerspectiveOutcome::new(score, findings)
    }
}
