use super::Workflow;
use crate::error::FlowError;
use crate::git::validate_branch_name;
use crate::github::{GitHubClient, WorkflowDispatch};
use crate::state::HotfixSession;
use crate::version::Version;
use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

/// Result of `hotfix start`
#[derive(Debug, Clone, PartialEq)]
pub struct StartReport {
    pub branch: String,
    pub base: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FinishOptions {
    pub push: bool,
    pub deploy: bool,
}

impl Default for FinishOptions {
    fn default() -> Self {
        FinishOptions {
            push: true,
            deploy: true,
        }
    }
}

/// Result of `hotfix finish`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinishReport {
    pub branch: String,
    pub merged_into: Vec<String>,
    pub tag: Option<String>,
    pub pushed: bool,
    pub deleted_local: bool,
    pub deleted_remote: bool,
    pub deployed: Option<String>,
}

/// Result of `hotfix status`
#[derive(Debug, Clone, PartialEq)]
pub enum HotfixStatus {
    None,
    Active(HotfixSession),
    /// The recorded branch no longer exists
    Stale(HotfixSession),
}

impl Workflow<'_> {
    /// Create a hotfix branch off master
    pub fn hotfix_start(&self, name: Option<&str>) -> Result<StartReport> {
        self.ensure_clean()?;

        let mut state = self.load_state()?;
        if let Some(session) = &state.hotfix {
            if self.git.branch_exists(&session.branch)? {
                return Err(FlowError::HotfixInProgress {
                    branch: session.branch.clone(),
                }
                .into());
            }
            warn!(
                "Discarding stale hotfix session for missing branch {}",
                session.branch
            );
            state.finish_hotfix();
        }

        let master = self.config.branches.master.as_str();
        let remote_available = self.fetch_remote()?;
        let outcome = self.fast_forward_branch(master, remote_available)?;
        info!("{} is {}", master, outcome);

        let (hotfix_name, version) = match name {
            Some(given) => {
                let hotfix_name = self.config.hotfix_name(given).to_string();
                let version =
                    Version::parse_with_prefix(&hotfix_name, &self.config.hotfix.tag_prefix);
                (hotfix_name, version)
            }
            None => self.generate_hotfix_name(master)?,
        };

        let branch = self.config.hotfix_branch(&hotfix_name);
        validate_branch_name(&branch)?;
        if self.git.branch_exists(&branch)? {
            return Err(FlowError::BranchExists(branch).into());
        }

        self.git.create_branch(&branch, master)?;
        info!("Created {} from {}", branch, master);

        let version = version.map(|v| v.to_string());
        state.start_hotfix(&branch, master, version.clone());
        self.save_state(&state)?;

        Ok(StartReport {
            branch,
            base: master.to_string(),
            version,
        })
    }

    /// Next patch version after the latest tag, or a timestamp when there is none
    fn generate_hotfix_name(&self, master: &str) -> Result<(String, Option<Version>)> {
        let prefix = &self.config.hotfix.tag_prefix;
        if let Some(tag) = self.git.latest_tag(master)? {
            match Version::parse_with_prefix(&tag, prefix).map(Version::bump_patch) {
                Some(Some(next)) => {
                    info!("Latest release is {}, hotfix will be {}", tag, next);
                    return Ok((next.to_string(), Some(next)));
                }
                Some(None) => warn!("Cannot bump the patch of {}, using a timestamp name", tag),
                None => warn!("Latest tag {} is not a version, using a timestamp name", tag),
            }
        }

        let stamp = jiff::Zoned::now().strftime("%Y%m%d-%H%M").to_string();
        Ok((stamp, None))
    }

    /// Merge the hotfix into master and develop, tag, push, clean up and deploy
    pub fn hotfix_finish(
        &self,
        name: Option<&str>,
        options: FinishOptions,
        gh: Option<&GitHubClient>,
    ) -> Result<FinishReport> {
        self.ensure_clean()?;

        let mut state = self.load_state()?;
        let branch = self.resolve_hotfix_branch(name, state.hotfix.as_ref())?;
        if !self.git.branch_exists(&branch)? {
            return Err(FlowError::BranchNotFound(branch).into());
        }

        let deploy_workflow = self
            .config
            .deploy
            .workflow
            .as_deref()
            .filter(|_| options.deploy);
        if deploy_workflow.is_some() && gh.is_none() {
            return Err(anyhow!(
                "A deployment workflow is configured but GitHub CLI is unavailable"
            ));
        }

        let master = self.config.branches.master.as_str();
        let develop = self.config.branches.develop.as_str();
        let remote = self.config.remote.as_str();
        let remote_available = self.fetch_remote()?;

        let mut report = FinishReport {
            branch: branch.clone(),
            ..FinishReport::default()
        };

        // Nothing is pushed until both merges succeed
        for target in [master, develop] {
            let merged = self
                .fast_forward_branch(target, remote_available)
                .and_then(|_| self.merge_into(&branch, target));
            if let Err(e) = merged {
                self.restore_branch(&branch);
                if !report.merged_into.is_empty() {
                    warn!(
                        "{} was merged locally into {} but nothing was pushed",
                        branch,
                        report.merged_into.join(", ")
                    );
                }
                return Err(e);
            }
            report.merged_into.push(target.to_string());
        }

        report.tag = self.tag_release(&branch, state.hotfix.as_ref(), master)?;

        let push = options.push && self.config.hotfix.push;
        if push && remote_available {
            let mut refs = vec![master, develop];
            if let Some(tag) = report.tag.as_deref() {
                refs.push(tag);
            }
            self.git.push(remote, &refs, false).with_context(|| {
                format!(
                    "Failed to push {} to {}; run 'heycx hotfix finish' again to retry",
                    refs.join(" "),
                    remote
                )
            })?;
            report.pushed = true;
        } else if push {
            warn!("Not pushing: remote '{}' is not configured", remote);
        }

        if self.config.hotfix.delete_branch {
            self.git.checkout(develop)?;
            self.git.delete_branch(&branch)?;
            report.deleted_local = true;

            if report.pushed && self.git.remote_branch_exists(remote, &branch)? {
                match self.git.delete_remote_branch(remote, &branch) {
                    Ok(()) => report.deleted_remote = true,
                    Err(e) => warn!("Could not delete {}/{}: {:#}", remote, branch, e),
                }
            }
        }

        self.git.checkout(develop)?;
        if state
            .hotfix
            .as_ref()
            .is_some_and(|session| session.branch == branch)
        {
            state.finish_hotfix();
            self.save_state(&state)?;
        }

        if let (Some(workflow), Some(gh)) = (deploy_workflow, gh) {
            if !report.pushed {
                warn!(
                    "Nothing was pushed; {} will deploy {}/{} without this hotfix",
                    workflow, remote, master
                );
            }
            let dispatch = WorkflowDispatch {
                workflow: workflow.to_string(),
                git_ref: master.to_string(),
                inputs: self
                    .config
                    .deploy
                    .inputs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            };
            gh.run_workflow(&dispatch).with_context(|| {
                format!(
                    "{} was merged into {} and {}, but the deployment trigger failed",
                    branch, master, develop
                )
            })?;
            info!("Triggered deployment workflow {}", workflow);
            report.deployed = Some(workflow.to_string());
        }

        Ok(report)
    }

    fn resolve_hotfix_branch(
        &self,
        name: Option<&str>,
        session: Option<&HotfixSession>,
    ) -> Result<String> {
        if let Some(given) = name {
            return Ok(self.config.hotfix_branch(given));
        }
        if let Some(session) = session {
            return Ok(session.branch.clone());
        }
        match self.git.current_branch()? {
            Some(current) if self.config.is_hotfix_branch(&current) => Ok(current),
            _ => Err(FlowError::NoHotfixInProgress.into()),
        }
    }

    /// Tag master when the hotfix name is a version; returns the tag created
    fn tag_release(
        &self,
        branch: &str,
        session: Option<&HotfixSession>,
        master: &str,
    ) -> Result<Option<String>> {
        if !self.config.hotfix.tag {
            return Ok(None);
        }

        let prefix = &self.config.hotfix.tag_prefix;
        let version = session
            .filter(|s| s.branch == branch)
            .and_then(|s| s.version.as_deref())
            .and_then(|v| Version::parse(v).ok())
            .or_else(|| Version::parse_with_prefix(self.config.hotfix_name(branch), prefix));

        let Some(version) = version else {
            info!("{} is not a version, skipping tag", branch);
            return Ok(None);
        };

        let tag = format!("{}{}", prefix, version);
        if self.git.tag_exists(&tag)? {
            // Left behind by an earlier finish whose push failed
            let tagged = self.git.rev_parse(&format!("{}^{{commit}}", tag))?;
            if tagged == self.git.rev_parse(master)? {
                info!("{} already tags {}, pushing it again", tag, master);
                return Ok(Some(tag));
            }
            warn!("Tag {} already exists elsewhere, not re-tagging", tag);
            return Ok(None);
        }

        self.git
            .create_tag(&tag, &format!("Hotfix {}", version), master)?;
        info!("Tagged {} as {}", master, tag);
        Ok(Some(tag))
    }

    /// Report the recorded hotfix session
    pub fn hotfix_status(&self) -> Result<HotfixStatus> {
        let state = self.load_state()?;
        match state.hotfix {
            None => Ok(HotfixStatus::None),
            Some(session) => {
                if self.git.branch_exists(&session.branch)? {
                    Ok(HotfixStatus::Active(session))
                } else {
                    Ok(HotfixStatus::Stale(session))
                }
            }
        }
    }
}
