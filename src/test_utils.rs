//! Test utilities for heycx

use crate::git::{GitClient, MockGit};
use crate::github::{GitHubClient, MockGitHub, PullRequestSummary};
use tempfile::TempDir;

/// Wrap a mock git client whose git directory is a fresh temp dir,
/// so state files written by workflows stay isolated per test
pub fn mock_repo(mock: MockGit) -> (TempDir, GitClient) {
    let dir = TempDir::new().expect("create temp dir");
    let git = GitClient::Mock(mock.with_git_dir(dir.path()));
    (dir, git)
}

/// Create a mock GitHub client that already has one open pull request
pub fn github_with_open_pr(head: &str, base: &str) -> GitHubClient {
    let mut mock = MockGitHub::new();
    mock.open_pull_requests.push(PullRequestSummary {
        number: 7,
        title: format!("Existing PR for {}", head),
        url: "https://github.com/test/repo/pull/7".to_string(),
        head_ref_name: head.to_string(),
        base_ref_name: base.to_string(),
        is_draft: false,
    });
    GitHubClient::Mock(mock)
}
