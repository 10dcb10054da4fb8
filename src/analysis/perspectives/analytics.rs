use super::{mean, AnalysisContext, Perspective};
use crate::analysis::history::fix_ratio;
use crate::analysis::trend::{detect_regression, fitness_slope, prior_max};
use crate::models::finding::{Finding, Priority};
use crate::models::perspective::{PerspectiveId, PerspectiveOutcome};

const SLOPE_PENALTY: f64 = 5.0;
const FIX_RATIO_CEILING: f64 = 0.5;

/// Trends across generations and commit patterns.
pub struct AnalyticsPerspective;

impl Perspective for AnalyticsPerspective {
    fn id(&self) -> PerspectiveId {
        PerspectiveId::Analytics
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> PerspectiveOutcome {
        let settings = ctx.settings;
        let history = &ctx.state.fitness_history;
        let commits = &ctx.history.commits;

        if history.len() < 2 && commits.is_empty() {
            return PerspectiveOutcome::missing(
                Finding::new(
                    Priority::Critical,
                    "Establish development history",
                    "Neither recorded generations nor commit history are available for trend analysis.",
                )
                .with_metric(history.len() as f64, 2.0)
                .with_criteria([
                    "Commit work to a git repository",
                    "Record at least two generations",
                ])
                .with_tags(["trend"]),
            );
        }

        let mut components = Vec::new();
        let mut findings = Vec::new();

        if let Some(slope) = fitness_slope(history, settings.trend_window) {
            if slope >= 0.0 {
                components.push(1.0);
            } else {
                components.push((1.0 + SLOPE_PENALTY * slope).max(0.0));
                findings.push(
                    Finding::new(
                        Priority::High,
                        "Fitness declining",
                        format!(
                            "Overall fitness falls by {:.4} per generation over the last {} generations.",
                            -slope,
                            settings.trend_window.min(history.len())
                        ),
                    )
                    .with_metric(slope, 0.0)
                    .with_criteria([
                        "Review recent changes",
                        "Identify regression sources",
                        "Prioritize stability over features",
                    ])
                    .with_tags(["trend"]),
                );
            }
        }

        if detect_regression(history) {
            if let Some((latest, earlier)) = history.split_last() {
                let best = prior_max(earlier).unwrap_or(0.0);
                findings.push(
                    Finding::new(
                        Priority::High,
                        format!("Regression in generation {}", latest.generation),
                        format!(
                            "Overall fitness {:.4} is below the prior best of {:.4}.",
                            latest.overall, best
                        ),
                    )
                    .with_metric(latest.overall, best)
                    .with_criteria([
                        "Identify the changes since the best generation",
                        "Restore overall fitness to the prior best",
                    ])
                    .with_tags(["regression"]),
                );
            }
        }

        if let Some(ratio) = fix_ratio(commits, settings.fix_ratio_window) {
            components.push(1.0 - ratio);
            if ratio > FIX_RATIO_CEILING {
                let window = commits.len().min(settings.fix_ratio_window);
                findings.push(
                    Finding::new(
                        Priority::Medium,
                        "High bug fix rate detected",
                        format!(
                            "{} of the last {} commits are fixes.",
                            (ratio * window as f64).round() as usize,
                            window
                        ),
                    )
                    .with_metric(ratio, FIX_RATIO_CEILING)
                    .with_criteria([
                        "Improve test coverage",
                        "Add pre-commit hooks",
                        "Review development process",
                    ])
                    .with_tags(["process"]),
                );
            }
        }

        for event in &ctx.history.drift {
            let mut description = format!(
                "{} changed in {} commit(s) since it was last incorporated.",
                event.document,
                event.commits.len()
            );
            if let Some(latest) = event.commits.first() {
                description.push_str(&format!(" Latest: {}", latest.message));
                for line in &latest.excerpt {
                    description.push('\n');
                    description.push_str(line);
                }
            }
            findings.push(
                Finding::new(
                    Priority::High,
                    format!("Incorporate changes to {}", event.document),
                    description,
                )
                .at(&event.document, None)
                .with_criteria([
                    format!("Review the changes to {}", event.document),
                    "Reflect new or changed requirements in the increment queue".to_string(),
                ])
                .with_tags(["drift"]),
            );
        }

        PerspectiveOutcome::new(mean(&components), findings)
    }
}
