pub mod analytics;
pub mod debug;
pub mod system;
pub mod testing;
pub mod user;

use crate::commands::settings::EngineSettings;
use crate::error::{EngineError, Result};
use crate::models::history::HistoryReport;
use crate::models::organism::OrganismState;
use crate::models::perspective::{PerspectiveId, PerspectiveOutcome, PerspectiveResult};
use crate::models::snapshot::CodebaseSnapshot;
use std::path::Path;

/// Everything a perspective may read. Perspectives never mutate it.
pub struct AnalysisContext<'a> {
    pub root: &'a Path,
    pub snapshot: &'a CodebaseSnapshot,
    pub history: &'a HistoryReport,
    pub state: &'a OrganismState,
    pub settings: &'a EngineSettings,
}

/// One scoring viewpoint over the same context.
pub trait Perspective {
    fn id(&self) -> PerspectiveId;

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> PerspectiveOutcome;
}

pub fn perspective_for(id: PerspectiveId) -> Box<dyn Perspective> {
    match id {
        PerspectiveId::User => Box::new(user::UserPerspective),
        PerspectiveId::Test => Box::new(testing::TestPerspective),
        PerspectiveId::System => Box::new(system::SystemPerspective),
        PerspectiveId::Analytics => Box::new(analytics::AnalyticsPerspective),
        PerspectiveId::Debug => Box::new(debug::DebugPerspective),
    }
}

/// Run one perspective and enforce its contract: a finite score in
/// [0, 1] and only verifiable findings. Violations are hard errors, never
/// clamped. Findings come back ordered by priority, then deviation.
pub fn run_perspective(
    perspective: &dyn Perspective,
    ctx: &AnalysisContext<'_>,
) -> Result<PerspectiveResult> {
    let id = perspective.id();
    let PerspectiveOutcome { score, mut findings } = perspective.analyze(ctx);

    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(EngineError::ScoreOutOfBounds {
            perspective: id,
            score,
        });
    }
    if let Some(bad) = findings.iter().find(|f| !f.is_verifiable()) {
        return Err(EngineError::UnverifiableFinding {
            perspective: id,
            title: bad.title.clone(),
        });
    }

    findings.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.deviation().total_cmp(&a.deviation()))
    });

    log::info!("{} perspective: score {:.3}, {} findings", id, score, findings.len());
    Ok(PerspectiveResult {
        perspective: id,
        score,
        findings,
    })
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}
