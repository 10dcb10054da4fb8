use crate::models::finding::{Finding, Priority};
use crate::models::perspective::{PerspectiveId, PerspectiveResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFinding {
    pub perspective: PerspectiveId,
    #[serde(flatten)]
    pub finding: Finding,
}

/// Merge every perspective's findings into one list ordered by priority,
/// then descending deviation, then perspective order. The sort is stable,
/// so remaining ties keep each perspective's own order.
pub fn rank_findings(results: &[PerspectiveResult]) -> Vec<RankedFinding> {
    let mut ranked: Vec<RankedFinding> = results
        .iter()
        .flat_map(|result| {
            result.findings.iter().map(move |finding| RankedFinding {
                perspective: result.perspective,
                finding: finding.clone(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.finding
            .priority
            .cmp(&b.finding.priority)
            .then_with(|| b.finding.deviation().total_cmp(&a.finding.deviation()))
            .then_with(|| a.perspective.cmp(&b.perspective))
    });
    ranked
}

/// Only the findings in the most urgent priority band present.
pub fn top_priority_findings(ranked: &[RankedFinding]) -> Vec<RankedFinding> {
    let Some(top) = ranked.iter().map(|r| r.finding.priority).min() else {
        return Vec::new();
    };
    ranked
        .iter()
        .filter(|r| r.finding.priority == top)
        .cloned()
        .collect()
}

pub fn count_by_priority(ranked: &[RankedFinding], priority: Priority) -> usize {
    ranked.iter().filter(|r| r.finding.priority == priority).count()
}
