use crate::error::FlowError;
use crate::github::models::*;
use crate::process::{find_executable, Tool, ToolOutput};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::debug;

#[cfg(test)]
use std::cell::RefCell;

/// GitHub client abstraction
pub enum GitHubClient {
    Real(RealGitHub),
    #[cfg(test)]
    Mock(MockGitHub),
}

impl GitHubClient {
    /// Create a new real GitHub client running in `work_dir`
    pub fn new(work_dir: &Path) -> Result<Self> {
        Ok(GitHubClient::Real(RealGitHub::new(work_dir)?))
    }

    /// Create a mock client for testing
    #[cfg(test)]
    pub fn mock() -> Self {
        GitHubClient::Mock(MockGitHub::new())
    }

    /// Raw `gh version` output
    pub fn version_output(&self) -> Result<String> {
        match self {
            GitHubClient::Real(client) => client.version_output(),
            #[cfg(test)]
            GitHubClient::Mock(client) => Ok(client.version.clone()),
        }
    }

    /// Fail unless gh is logged in
    pub fn ensure_authenticated(&self) -> Result<()> {
        match self {
            GitHubClient::Real(client) => client.ensure_authenticated(),
            #[cfg(test)]
            GitHubClient::Mock(client) => client.ensure_authenticated(),
        }
    }

    /// Open pull requests from `head` into `base`
    pub fn find_open_pull_requests(
        &self,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        match self {
            GitHubClient::Real(client) => client.find_open_pull_requests(head, base),
            #[cfg(test)]
            GitHubClient::Mock(client) => client.find_open_pull_requests(head, base),
        }
    }

    /// Create a pull request, returning its URL
    pub fn create_pull_request(&self, pr: &PullRequest) -> Result<String> {
        match self {
            GitHubClient::Real(client) => client.create_pull_request(pr),
            #[cfg(test)]
            GitHubClient::Mock(client) => client.create_pull_request(pr),
        }
    }

    /// Dispatch a GitHub Actions workflow
    pub fn run_workflow(&self, dispatch: &WorkflowDispatch) -> Result<()> {
        match self {
            GitHubClient::Real(client) => client.run_workflow(dispatch),
            #[cfg(test)]
            GitHubClient::Mock(client) => client.run_workflow(dispatch),
        }
    }
}

/// Real GitHub client using gh CLI
pub struct RealGitHub {
    gh: Tool,
}

impl RealGitHub {
    /// Create a new real GitHub client
    pub fn new(work_dir: &Path) -> Result<Self> {
        let gh_path = find_executable("gh", "HEYCX_GH")?;
        debug!("Using gh at {:?}", gh_path);

        Ok(RealGitHub {
            gh: Tool::new("gh", gh_path).in_dir(work_dir),
        })
    }

    /// Execute a gh command, mapping well-known failures
    fn execute_gh(&self, args: &[&str]) -> Result<ToolOutput> {
        let output = self.gh.run(args)?;

        if !output.success() {
            let stderr = output.stderr.trim();

            if stderr.contains("401") || stderr.contains("403") || stderr.contains("auth login") {
                return Err(anyhow::Error::from(FlowError::ToolFailed {
                    tool: "gh".to_string(),
                    code: output.exit_code,
                    stderr: stderr.to_string(),
                })
                .context("Authentication failed. Run 'gh auth login'"));
            }

            return Err(FlowError::ToolFailed {
                tool: "gh".to_string(),
                code: output.exit_code,
                stderr: stderr.to_string(),
            }
            .into());
        }

        Ok(output)
    }

    fn version_output(&self) -> Result<String> {
        Ok(self.execute_gh(&["version"])?.stdout)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        let output = self.gh.run(&["auth", "status"])?;
        if !output.success() {
            return Err(anyhow::Error::from(FlowError::ToolFailed {
                tool: "gh".to_string(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
            .context("gh is not authenticated. Run 'gh auth login'"));
        }
        Ok(())
    }

    fn find_open_pull_requests(&self, head: &str, base: &str) -> Result<Vec<PullRequestSummary>> {
        let output = self.execute_gh(&[
            "pr", "list", "--head", head, "--base", base, "--state", "open", "--json",
            PR_LIST_FIELDS,
        ])?;
        output.parse_json().context("Failed to parse gh pr list output")
    }

    fn create_pull_request(&self, pr: &PullRequest) -> Result<String> {
        let args = pr.create_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.execute_gh(&args)?;

        pull_request_url(&output.stdout)
            .ok_or_else(|| anyhow!("gh pr create did not print a pull request URL"))
    }

    fn run_workflow(&self, dispatch: &WorkflowDispatch) -> Result<()> {
        let args = dispatch.run_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.execute_gh(&args)
            .with_context(|| format!("Failed to trigger workflow {}", dispatch.workflow))?;
        Ok(())
    }
}

/// gh prints the new PR URL as the last line of stdout
fn pull_request_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("https://") || line.starts_with("http://"))
        .map(str::to_string)
}

/// Mock GitHub client for testing
#[cfg(test)]
pub struct MockGitHub {
    pub version: String,
    pub authenticated: bool,
    pub open_pull_requests: Vec<PullRequestSummary>,
    pub fail_workflows: bool,
    pub created: RefCell<Vec<PullRequest>>,
    pub dispatched: RefCell<Vec<WorkflowDispatch>>,
}

#[cfg(test)]
impl MockGitHub {
    pub fn new() -> Self {
        MockGitHub {
            version: "gh version 2.40.1 (2023-12-13)".to_string(),
            authenticated: true,
            open_pull_requests: vec![],
            fail_workflows: false,
            created: RefCell::new(vec![]),
            dispatched: RefCell::new(vec![]),
        }
    }

    pub fn ensure_authenticated(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(anyhow::Error::from(FlowError::ToolFailed {
                tool: "gh".to_string(),
                code: 1,
                stderr: "You are not logged into any GitHub hosts. Run gh auth login to authenticate."
                    .to_string(),
            }))
        }
    }

    pub fn find_open_pull_requests(&self, head: &str, base: &str) -> Result<Vec<PullRequestSummary>> {
        Ok(self
            .open_pull_requests
            .iter()
            .filter(|pr| pr.head_ref_name == head && pr.base_ref_name == base)
            .cloned()
            .collect())
    }

    pub fn create_pull_request(&self, pr: &PullRequest) -> Result<String> {
        let mut created = self.created.borrow_mut();
        created.push(pr.clone());
        Ok(format!("https://github.com/test/repo/pull/{}", created.len()))
    }

    pub fn run_workflow(&self, dispatch: &WorkflowDispatch) -> Result<()> {
        if self.fail_workflows {
            return Err(anyhow!("workflow {} not found", dispatch.workflow));
        }
        self.dispatched.borrow_mut().push(dispatch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mock_create_pull_request() {
        let client = GitHubClient::mock();
        let pr = PullRequest {
            title: "Fix".to_string(),
            body: String::new(),
            head: "hotfix/1.0.1".to_string(),
            base: "master".to_string(),
            draft: false,
        };

        let url = client.create_pull_request(&pr).unwrap();
        assert_eq!(url, "https://github.com/test/repo/pull/1");
    }

    #[test]
    fn test_mock_unauthenticated() {
        let mut mock = MockGitHub::new();
        mock.authenticated = false;
        let client = GitHubClient::Mock(mock);

        let err = client.ensure_authenticated().unwrap_err();
        assert!(err.to_string().contains("gh auth login"));
    }

    #[test]
    fn test_real_gh_failure_maps_auth_errors() {
        // A stand-in "gh" that fails the way an unauthenticated gh does
        let client = RealGitHub {
            gh: Tool::new("gh", PathBuf::from("/bin/sh")),
        };
        let err = client
            .execute_gh(&["-c", "echo 'HTTP 401: Bad credentials' >&2; exit 1"])
            .unwrap_err();
        assert!(err.to_string().contains("gh auth login"));
        assert!(matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::ToolFailed { code: 1, .. })
        ));
    }

    #[test]
    fn test_pull_request_url() {
        let stdout = "\nCreating pull request for hotfix/1.0.1 into master in acme/app\n\nhttps://github.com/acme/app/pull/9\n";
        assert_eq!(
            pull_request_url(stdout).as_deref(),
            Some("https://github.com/acme/app/pull/9")
        );
        assert_eq!(pull_request_url("nothing useful"), None);
    }
}
