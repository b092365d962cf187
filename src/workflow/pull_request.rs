use super::Workflow;
use crate::error::FlowError;
use crate::github::{GitHubClient, PullRequest};
use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct PrOptions {
    pub title: Option<String>,
    pub body: Option<String>,
    pub base: Option<String>,
    pub draft: bool,
    pub push: bool,
}

/// Result of `pr create`
#[derive(Debug, Clone, PartialEq)]
pub struct PrReport {
    pub url: String,
    pub head: String,
    pub base: String,
    /// False when an open pull request already existed
    pub created: bool,
}

impl Workflow<'_> {
    /// Open a pull request from the current branch
    pub fn create_pull_request(&self, gh: &GitHubClient, options: PrOptions) -> Result<PrReport> {
        let head = self.git.current_branch()?.ok_or(FlowError::DetachedHead)?;
        let base = self.pull_request_base(&head, options.base.as_deref());
        if head == base {
            return Err(FlowError::SameHeadAndBase(head).into());
        }

        gh.ensure_authenticated()?;

        if options.push {
            let remote = self.config.remote.as_str();
            if self.git.has_remote(remote)? {
                info!("Pushing {} to {}", head, remote);
                self.git.push(remote, &[head.as_str()], true)?;
            } else {
                warn!("Remote '{}' is not configured, not pushing {}", remote, head);
            }
        }

        if let Some(existing) = gh.find_open_pull_requests(&head, &base)?.into_iter().next() {
            info!("Pull request #{} already open for {}", existing.number, head);
            return Ok(PrReport {
                url: existing.url,
                head,
                base,
                created: false,
            });
        }

        let title = match options.title {
            Some(title) => title,
            None => self.git.last_commit_subject()?,
        };
        let pr = PullRequest {
            title,
            body: options.body.unwrap_or_default(),
            head: head.clone(),
            base: base.clone(),
            draft: options.draft || self.config.pr.draft,
        };

        let url = gh.create_pull_request(&pr)?;
        Ok(PrReport {
            url,
            head,
            base,
            created: true,
        })
    }

    /// Hotfixes target master; everything else targets the configured base or develop
    fn pull_request_base(&self, head: &str, explicit: Option<&str>) -> String {
        if let Some(base) = explicit {
            return base.to_string();
        }
        if self.config.is_hotfix_branch(head) {
            return self.config.branches.master.clone();
        }
        self.config
            .pr
            .base
            .clone()
            .unwrap_or_else(|| self.config.branches.develop.clone())
    }
}
