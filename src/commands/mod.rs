pub(crate) mod fsio;
pub mod git;
pub mod increments;
pub mod scan;
pub mod scoring;
pub mod settings;
pub mod state;
