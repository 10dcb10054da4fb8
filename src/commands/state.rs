use crate::analysis::history::ENGINE_DIR;
use crate::analysis::trend::{is_regression, prior_max, round_score};
use crate::commands::fsio::write_atomic;
use crate::error::{EngineError, Result};
use crate::models::history::DriftEvent;
use crate::models::organism::{DevelopmentStage, FitnessRecord, OrganismState};
use crate::models::perspective::PerspectiveId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub use crate::analysis::trend::{detect_regression, regressions};

const STATE_FILE: &str = "organism_state.json";

/// Durable home of the [`OrganismState`]. The pipeline loads once, mutates
/// the value it owns, and saves once.
#[derive(Debug, Clone)]
pub struct OrganismStateStore {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub generation: u64,
    pub overall: f64,
    pub regression: bool,
    pub prior_best: Option<f64>,
    pub stage: DevelopmentStage,
}

impl OrganismStateStore {
    pub fn new(root: &Path) -> Self {
        Self::at(root.join(ENGINE_DIR).join(STATE_FILE))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted state, or the default (generation 0, nothing recorded)
    /// when the file is missing or unparsable.
    pub fn load(&self) -> OrganismState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("no organism state at {}, starting fresh", self.path.display());
                return OrganismState::default();
            }
            Err(e) => {
                log::warn!("organism state at {} unreadable: {}", self.path.display(), e);
                return OrganismState::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("organism state at {} corrupt, starting fresh: {}", self.path.display(), e);
            OrganismState::default()
        })
    }

    pub fn save(&self, state: &OrganismState) -> Result<()> {
        let mut raw = serde_json::to_string_pretty(state)?;
        raw.push('\n');
        write_atomic(&self.path, raw.as_bytes())?;
        log::info!("saved generation {} to {}", state.generation, self.path.display());
        Ok(())
    }
}

/// Append one generation: overall is the mean of `scores`, rounded to four
/// decimals; regression is judged against every earlier overall.
pub fn record_generation(
    state: &mut OrganismState,
    scores: &BTreeMap<PerspectiveId, f64>,
    timestamp: &str,
) -> Result<GenerationOutcome> {
    if scores.is_empty() {
        return Err(EngineError::EmptyGeneration);
    }
    for (&perspective, &score) in scores {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(EngineError::ScoreOutOfBounds { perspective, score });
        }
    }

    let mean = scores.values().sum::<f64>() / scores.len() as f64;
    let overall = round_score(mean);
    let prior_best = prior_max(&state.fitness_history);
    let regression = is_regression(overall, &state.fitness_history);

    let rounded: BTreeMap<PerspectiveId, f64> = scores
        .iter()
        .map(|(&perspective, &score)| (perspective, round_score(score)))
        .collect();
    state.generation += 1;
    state.fitness_history.push(FitnessRecord {
        generation: state.generation,
        overall,
        timestamp: timestamp.to_string(),
        scores: rounded.clone(),
    });
    state.fitness_scores = rounded;
    if state.created_at.is_none() {
        state.created_at = Some(timestamp.to_string());
    }
    state.last_updated = Some(timestamp.to_string());

    if regression {
        log::warn!(
            "generation {} regressed: {:.4} < prior best {:.4}",
            state.generation,
            overall,
            prior_best.unwrap_or(0.0)
        );
    }

    Ok(GenerationOutcome {
        generation: state.generation,
        overall,
        regression,
        prior_best,
        stage: state.stage(),
    })
}

/// Return to an earlier generation, discarding the records after it.
/// `fitness_scores` come back from the newest kept record.
pub fn rollback(state: &mut OrganismState, generation: u64) -> Result<()> {
    if generation > state.generation {
        return Err(EngineError::InvalidRollback {
            current: state.generation,
            requested: generation,
        });
    }
    state.fitness_history.retain(|r| r.generation <= generation);
    state.generation = generation;
    state.fitness_scores = state
        .fitness_history
        .last()
        .map(|r| r.scores.clone())
        .unwrap_or_default();
    Ok(())
}

/// Record the newest drift commit of each document as incorporated.
pub fn mark_documents_checked(state: &mut OrganismState, drift: &[DriftEvent]) {
    for event in drift {
        if let Some(latest) = event.latest_timestamp() {
            let entry = state.document_checks.entry(event.document.clone()).or_insert(latest);
            *entry = (*entry).max(latest);
        }
    }
}
