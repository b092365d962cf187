pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod process;
pub mod state;
pub mod version;
pub mod workflow;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use state::State;
