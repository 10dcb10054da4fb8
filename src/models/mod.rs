pub mod finding;
pub mod history;
pub mod increment;
pub mod organism;
pub mod perspective;
pub mod snapshot;
