use crate::models::organism::FitnessRecord;

/// Round half away from zero to four decimals.
pub fn round_score(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// True iff the newest record is below the maximum of every earlier one.
pub fn detect_regression(history: &[FitnessRecord]) -> bool {
    match history.split_last() {
        Some((latest, earlier)) => is_regression(latest.overall, earlier),
        None => false,
    }
}

/// True iff `overall` falls below the best of `prior`.
pub fn is_regression(overall: f64, prior: &[FitnessRecord]) -> bool {
    prior_max(prior).is_some_and(|best| overall < best)
}

pub fn prior_max(prior: &[FitnessRecord]) -> Option<f64> {
    prior.iter().map(|r| r.overall).reduce(f64::max)
}

/// Generations that regressed against every record before them.
pub fn regressions(history: &[FitnessRecord]) -> Vec<u64> {
    let mut best: Option<f64> = None;
    let mut flagged = Vec::new();
    for record in history {
        if let Some(b) = best {
            if record.overall < b {
                flagged.push(record.generation);
            }
        }
        best = Some(best.map_or(record.overall, |b| b.max(record.overall)));
    }
    flagged
}

/// Least-squares slope of overall fitness over the last `window` records.
/// `None` with fewer than two points.
pub fn fitness_slope(history: &[FitnessRecord], window: usize) -> Option<f64> {
    let start = history.len().saturating_sub(window);
    let points = &history[start..];
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = points.iter().map(|r| r.overall).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, record) in points.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (record.overall - mean_y);
        denominator += dx * dx;
    }
    Some(numerator / denominator)
}
