pub mod changelog;
pub mod changeset;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod forge;
pub mod git;
pub mod orchestrator;
pub mod outputs;
pub mod publish_output;
pub mod repo;
pub mod workspace;

pub use error::{ReleaseError, Result};
pub use orchestrator::{Orchestrator, RunOutcome};

#[cfg(test)]
pub mod test_helpers;
