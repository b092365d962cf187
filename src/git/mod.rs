use crate::error::FlowError;
use crate::version::version_meets_minimum;
use anyhow::{anyhow, Result};

mod client;

pub use client::*;

#[cfg(test)]
pub use client::MockGit;

/// Minimum supported git version
pub const MIN_GIT_VERSION: &str = "2.20.0";

/// How a merge should be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeMode {
    /// `--ff-only`
    FastForwardOnly,
    /// `--no-ff -m <message>`
    NoFastForward { message: String },
    /// `--no-edit`, fast-forward when possible
    Default,
}

/// Result of a merge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Completed,
    /// Only returned for [`MergeMode::FastForwardOnly`]
    NotFastForward,
    /// The merge stopped with conflicts and is still in progress
    Conflict(Vec<String>),
}

/// Check that git is usable and recent enough, returning its version
pub fn check_git_version(git: &GitClient) -> Result<String> {
    let output = git.version_output()?;
    let version = parse_git_version(&output)?;

    if !version_meets_minimum(&version, MIN_GIT_VERSION)? {
        return Err(anyhow!(
            "git version {} is too old. Minimum required: {}",
            version,
            MIN_GIT_VERSION
        ));
    }

    Ok(version)
}

/// Parse version from `git --version` output
fn parse_git_version(output: &str) -> Result<String> {
    // "git version 2.39.3 (Apple Git-145)" or "git version 2.43.0.windows.1"
    let raw = output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(2))
        .ok_or_else(|| anyhow!("Could not parse git version from output"))?;

    let numeric: Vec<&str> = raw
        .split('.')
        .take_while(|part| part.chars().all(|c| c.is_ascii_digit()) && !part.is_empty())
        .take(3)
        .collect();
    if numeric.is_empty() {
        return Err(anyhow!("Could not parse git version from '{}'", raw));
    }

    Ok(numeric.join("."))
}

/// Reject names git would refuse as branch names
pub fn validate_branch_name(name: &str) -> Result<(), FlowError> {
    let invalid = |reason: &str| FlowError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.starts_with('-') {
        return Err(invalid("must not start with '-'"));
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return Err(invalid("must not end with '/', '.' or '.lock'"));
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return Err(invalid("must not contain '..', '//' or '@{'"));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
    {
        return Err(invalid("contains whitespace or one of ~^:?*[\\"));
    }
    if name.split('/').any(|part| part.starts_with('.')) {
        return Err(invalid("path components must not start with '.'"));
    }

    Ok(())
}
