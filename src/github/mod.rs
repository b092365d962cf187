use crate::version::version_meets_minimum;
use anyhow::{anyhow, Result};

mod client;
mod models;

pub use client::*;
pub use models::*;

#[cfg(test)]
pub use client::MockGitHub;

/// Minimum supported gh CLI version
pub const MIN_GH_VERSION: &str = "2.20.0";

/// Check if gh CLI is installed and meets minimum version requirement
pub fn check_gh_version(gh: &GitHubClient) -> Result<String> {
    let version_output = gh.version_output()?;
    let version = parse_gh_version(&version_output)?;

    if !version_meets_minimum(&version, MIN_GH_VERSION)? {
        return Err(anyhow!(
            "gh version {} is too old. Minimum required: {}",
            version,
            MIN_GH_VERSION
        ));
    }

    Ok(version)
}

/// Parse version from gh version output
fn parse_gh_version(output: &str) -> Result<String> {
    // gh version output format: "gh version 2.32.0 (2023-06-20)"
    let version = output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(2))
        .ok_or_else(|| anyhow!("Could not parse gh version from output"))?;

    Ok(version.to_string())
}
