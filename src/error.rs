use crate::models::increment::IncrementStatus;
use crate::models::perspective::PerspectiveId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures surfaced to the caller.
///
/// Missing directories, missing git metadata, corrupt state files and
/// unparsable sources never show up here; they degrade to defaults or
/// findings at the component boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("perspective {perspective} produced score {score}, outside [0, 1]")]
    ScoreOutOfBounds { perspective: PerspectiveId, score: f64 },

    #[error("perspective {perspective} produced finding '{title}' without location or metric")]
    UnverifiableFinding { perspective: PerspectiveId, title: String },

    #[error("increment {id:04}: transition {from} -> {to} is not allowed")]
    InvalidTransition {
        id: u32,
        from: IncrementStatus,
        to: IncrementStatus,
    },

    #[error("cannot record a generation without perspective scores")]
    EmptyGeneration,

    #[error("cannot roll back from generation {current} to {requested}")]
    InvalidRollback { current: u64, requested: u64 },

    #[error("increment {0:04} not found in the requirement queue")]
    UnknownIncrement(u32),

    #[error("increment {0:04} appears more than once in the requirement queue")]
    DuplicateIncrement(u32),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
