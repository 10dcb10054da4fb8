pub mod complexity;
pub mod coupling;
pub mod coverage;
pub mod history;
pub mod language;
pub mod markers;
pub mod perspectives;
pub mod ranking;
pub mod trend;
