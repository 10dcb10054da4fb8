use super::{fraction, mean, AnalysisContext, Perspective};
use crate::models::finding::{Finding, Priority};
use crate::models::perspective::{PerspectiveId, PerspectiveOutcome};

/// Architecture health: file size, function complexity, import fan-out.
pub struct SystemPerspective;

impl Perspective for SystemPerspective {
    fn id(&self) -> PerspectiveId {
        PerspectiveId::System
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> PerspectiveOutcome {
        let snapshot = ctx.snapshot;
        let settings = ctx.settings;

        if snapshot.total_files == 0 {
            return PerspectiveOutcome::missing(
                Finding::new(
                    Priority::Critical,
                    "Add source files",
                    "No recognised source files found to analyze.",
                )
                .with_metric(0.0, 1.0)
                .with_criteria(["Add source files in a supported language"])
                .with_tags(["architecture"]),
            );
        }

        let max_lines = settings.max_file_lines;
        let max_complexity = settings.max_function_complexity;
        let mut findings = Vec::new();
        let mut total_functions = 0usize;
        let mut complex_functions = 0usize;
        let mut high_fan_out = 0usize;

        for file in snapshot.files.values() {
            if file.line_count > max_lines {
                findings.push(
                    Finding::new(
                        severity(file.line_count, max_lines),
                        format!("Refactor {}", file.path),
                        format!(
                            "File has {} lines (max recommended: {})",
                            file.line_count, max_lines
                        ),
                    )
                    .at(&file.path, None)
                    .with_metric(file.line_count as f64, max_lines as f64)
                    .with_criteria([
                        "Extract related functions into separate modules".to_string(),
                        format!("Keep file under {} lines", max_lines),
                        "Maintain single responsibility".to_string(),
                    ])
                    .with_tags(["refactoring", "modularization"]),
                );
            }

            total_functions += file.functions.len();
            for function in &file.functions {
                if function.complexity <= max_complexity {
                    continue;
                }
                complex_functions += 1;
                findings.push(
                    Finding::new(
                        severity(function.complexity, max_complexity),
                        format!("Reduce complexity of {} in {}", function.name, file.path),
                        format!(
                            "Cyclomatic complexity is {} (max: {})",
                            function.complexity, max_complexity
                        ),
                    )
                    .at(&file.path, Some(function.line))
                    .with_metric(function.complexity as f64, max_complexity as f64)
                    .with_criteria([
                        "Extract complex conditions into named functions",
                        "Reduce nesting depth",
                        "Use early returns where appropriate",
                    ])
                    .with_tags(["complexity", "readability"]),
                );
            }

            if file.imports > settings.max_imports {
                high_fan_out += 1;
                findings.push(
                    Finding::new(
                        Priority::Low,
                        format!("Reduce dependencies of {}", file.path),
                        format!(
                            "File imports {} modules (max: {})",
                            file.imports, settings.max_imports
                        ),
                    )
                    .at(&file.path, None)
                    .with_metric(file.imports as f64, settings.max_imports as f64)
                    .with_criteria(["Split the file along its dependency clusters"])
                    .with_tags(["coupling"]),
                );
            }
        }

        let score = mean(&[
            1.0 - fraction(snapshot.oversized_files, snapshot.total_files),
            1.0 - fraction(complex_functions, total_functions),
            1.0 - fraction(high_fan_out, snapshot.total_files),
        ]);

        PerspectiveOutcome::new(score, findings)
    }
}

/// HIGH at double the ceiling or more.
fn severity(value: usize, ceiling: usize) -> Priority {
    if value >= ceiling.saturating_mul(2) {
        Priority::High
    } else {
        Priority::Medium
    }
}
