//! Branch workflows built on top of the git and GitHub clients.
//!
//! Every workflow runs its steps one external command at a time. Workflows
//! that move branches require a clean working tree and try to leave the
//! repository on a sensible branch when they fail part-way.

use crate::config::Config;
use crate::error::FlowError;
use crate::git::{GitClient, MergeMode, MergeOutcome};
use crate::state::State;
use anyhow::{anyhow, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod hotfix;
mod pull_request;
mod sync;

pub use hotfix::{FinishOptions, FinishReport, HotfixStatus, StartReport};
pub use pull_request::{PrOptions, PrReport};
pub use sync::SyncReport;

/// What happened to a long-lived branch when it was brought up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    UpToDate,
    FastForwarded,
    Merged,
    /// Local branch created from the remote one
    Created,
    /// No remote counterpart to update from
    Skipped,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyncOutcome::UpToDate => "up to date",
            SyncOutcome::FastForwarded => "fast-forwarded",
            SyncOutcome::Merged => "merged",
            SyncOutcome::Created => "created from remote",
            SyncOutcome::Skipped => "skipped (no remote branch)",
        };
        f.write_str(text)
    }
}

/// Entry point for all branch workflows on one repository
pub struct Workflow<'a> {
    git: &'a GitClient,
    config: &'a Config,
    state_path: PathBuf,
}

impl<'a> Workflow<'a> {
    pub fn new(git: &'a GitClient, config: &'a Config) -> Result<Self> {
        let state_path = State::path_for(&git.git_dir()?);
        Ok(Workflow {
            git,
            config,
            state_path,
        })
    }

    pub fn load_state(&self) -> Result<State> {
        State::load(&self.state_path)
    }

    fn save_state(&self, state: &State) -> Result<()> {
        state.save(&self.state_path)
    }

    fn ensure_clean(&self) -> Result<()> {
        if self.git.is_clean()? {
            Ok(())
        } else {
            Err(FlowError::DirtyWorkingTree.into())
        }
    }

    /// Fetch the configured remote; returns false when the repository has no such remote
    fn fetch_remote(&self) -> Result<bool> {
        let remote = &self.config.remote;
        if !self.git.has_remote(remote)? {
            warn!("Remote '{}' is not configured, working locally", remote);
            return Ok(false);
        }

        info!("Fetching {}", remote);
        self.git.fetch(remote)?;
        Ok(true)
    }

    /// Check out `branch` and bring it up to date with its remote counterpart.
    ///
    /// A fast-forward is tried first; a diverged branch gets a regular merge.
    /// A conflicting merge is aborted and reported.
    fn update_branch(&self, branch: &str, remote_available: bool) -> Result<SyncOutcome> {
        self.bring_up_to_date(branch, remote_available, true)
    }

    /// Like `update_branch`, but a diverged branch is an error instead of a merge
    fn fast_forward_branch(&self, branch: &str, remote_available: bool) -> Result<SyncOutcome> {
        self.bring_up_to_date(branch, remote_available, false)
    }

    fn bring_up_to_date(
        &self,
        branch: &str,
        remote_available: bool,
        merge_diverged: bool,
    ) -> Result<SyncOutcome> {
        let remote = &self.config.remote;
        let has_remote_branch = remote_available && self.git.remote_branch_exists(remote, branch)?;

        if !self.git.branch_exists(branch)? {
            if has_remote_branch {
                info!("Creating {} from {}/{}", branch, remote, branch);
                self.git.checkout_tracking(branch, remote)?;
                return Ok(SyncOutcome::Created);
            }
            return Err(FlowError::BranchNotFound(branch.to_string()).into());
        }

        self.git.checkout(branch)?;
        if !has_remote_branch {
            debug!("{} has no remote counterpart", branch);
            return Ok(SyncOutcome::Skipped);
        }

        let upstream = format!("{}/{}", remote, branch);
        let before = self.git.rev_parse(branch)?;

        match self.git.merge(&upstream, &MergeMode::FastForwardOnly)? {
            MergeOutcome::Completed => {
                if self.git.rev_parse(branch)? == before {
                    Ok(SyncOutcome::UpToDate)
                } else {
                    Ok(SyncOutcome::FastForwarded)
                }
            }
            MergeOutcome::NotFastForward if !merge_diverged => Err(FlowError::BranchDiverged {
                branch: branch.to_string(),
                upstream,
            }
            .into()),
            MergeOutcome::NotFastForward => {
                info!("{} has diverged from {}, merging", branch, upstream);
                match self.git.merge(&upstream, &MergeMode::Default)? {
                    MergeOutcome::Completed => Ok(SyncOutcome::Merged),
                    MergeOutcome::Conflict(files) => {
                        self.git.abort_merge()?;
                        Err(FlowError::MergeConflict {
                            source_branch: upstream,
                            target: branch.to_string(),
                            files,
                        }
                        .into())
                    }
                    MergeOutcome::NotFastForward => {
                        Err(anyhow!("Unexpected fast-forward failure merging {}", upstream))
                    }
                }
            }
            MergeOutcome::Conflict(files) => {
                self.git.abort_merge()?;
                Err(FlowError::MergeConflict {
                    source_branch: upstream,
                    target: branch.to_string(),
                    files,
                }
                .into())
            }
        }
    }

    /// Merge `source` into `target` with a merge commit, aborting on conflict
    fn merge_into(&self, source: &str, target: &str) -> Result<()> {
        self.git.checkout(target)?;

        let message = format!("Merge branch '{}' into {}", source, target);
        match self
            .git
            .merge(source, &MergeMode::NoFastForward { message })?
        {
            MergeOutcome::Completed => {
                info!("Merged {} into {}", source, target);
                Ok(())
            }
            MergeOutcome::Conflict(files) => {
                warn!("Merging {} into {} conflicts, aborting", source, target);
                self.git.abort_merge()?;
                Err(FlowError::MergeConflict {
                    source_branch: source.to_string(),
                    target: target.to_string(),
                    files,
                }
                .into())
            }
            MergeOutcome::NotFastForward => Err(anyhow!(
                "Unexpected fast-forward failure merging {} into {}",
                source,
                target
            )),
        }
    }

    /// Best-effort checkout used when unwinding after a failure
    fn restore_branch(&self, branch: &str) {
        if let Err(e) = self.git.checkout(branch) {
            warn!("Could not switch back to {}: {:#}", branch, e);
        }
    }
}
