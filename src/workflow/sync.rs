use super::{SyncOutcome, Workflow};
use anyhow::{anyhow, Result};
use tracing::{info, warn};

/// Result of `sync`: one entry per long-lived branch
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub branches: Vec<(String, SyncOutcome)>,
    /// Branch checked out again afterwards, `None` if HEAD was detached
    pub returned_to: Option<String>,
}

impl Workflow<'_> {
    /// Update master and develop from the remote, then return to the original branch
    pub fn sync(&self) -> Result<SyncReport> {
        self.ensure_clean()?;

        let remote = self.config.remote.as_str();
        if !self.fetch_remote()? {
            return Err(anyhow!(
                "Remote '{}' is not configured; nothing to sync from",
                remote
            ));
        }

        let original_branch = self.git.current_branch()?;
        // A detached HEAD is restored by commit id
        let original = match &original_branch {
            Some(branch) => branch.clone(),
            None => self.git.rev_parse("HEAD")?,
        };

        let mut branches = Vec::new();
        for branch in [
            self.config.branches.master.as_str(),
            self.config.branches.develop.as_str(),
        ] {
            if !self.git.remote_branch_exists(remote, branch)? {
                warn!("{}/{} does not exist, skipping", remote, branch);
                branches.push((branch.to_string(), SyncOutcome::Skipped));
                continue;
            }

            match self.update_branch(branch, true) {
                Ok(outcome) => {
                    info!("{}: {}", branch, outcome);
                    branches.push((branch.to_string(), outcome));
                }
                Err(e) => {
                    self.restore_branch(&original);
                    return Err(e);
                }
            }
        }

        if self.git.current_branch()?.as_deref() != Some(original.as_str()) {
            self.git.checkout(&original)?;
        }

        let mut state = self.load_state()?;
        state.update_last_sync();
        self.save_state(&state)?;

        Ok(SyncReport {
            branches,
            returned_to: original_branch,
        })
    }
}
