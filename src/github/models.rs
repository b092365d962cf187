use serde::{Deserialize, Serialize};

/// A pull request to be opened
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub draft: bool,
}

impl PullRequest {
    /// Arguments for `gh pr create`
    pub fn create_args(&self) -> Vec<String> {
        let mut args = vec![
            "pr".to_string(),
            "create".to_string(),
            "--title".to_string(),
            self.title.clone(),
            "--body".to_string(),
            self.body.clone(),
            "--base".to_string(),
            self.base.clone(),
            "--head".to_string(),
            self.head.clone(),
        ];
        if self.draft {
            args.push("--draft".to_string());
        }
        args
    }
}

/// An existing pull request as reported by `gh pr list --json`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PullRequestSummary {
    pub number: u32,
    pub title: String,
    pub url: String,
    #[serde(rename = "headRefName")]
    pub head_ref_name: String,
    #[serde(rename = "baseRefName")]
    pub base_ref_name: String,
    #[serde(rename = "isDraft", default)]
    pub is_draft: bool,
}

/// JSON fields requested from `gh pr list`
pub const PR_LIST_FIELDS: &str = "number,title,url,headRefName,baseRefName,isDraft";

/// A `gh workflow run` request
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDispatch {
    pub workflow: String,
    pub git_ref: String,
    pub inputs: Vec<(String, String)>,
}

impl WorkflowDispatch {
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "workflow".to_string(),
            "run".to_string(),
            self.workflow.clone(),
            "--ref".to_string(),
            self.git_ref.clone(),
        ];
        for (key, value) in &self.inputs {
            args.push("-f".to_string());
            args.push(format!("{}={}", key, value));
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_create_args() {
        let pr = PullRequest {
            title: "Fix login crash".to_string(),
            body: String::new(),
            head: "hotfix/1.2.2".to_string(),
            base: "master".to_string(),
            draft: true,
        };
        insta::assert_snapshot!(
            pr.create_args().join(" "),
            @"pr create --title Fix login crash --body  --base master --head hotfix/1.2.2 --draft"
        );
    }

    #[test]
    fn test_workflow_run_args() {
        let dispatch = WorkflowDispatch {
            workflow: "deploy.yml".to_string(),
            git_ref: "master".to_string(),
            inputs: vec![("environment".to_string(), "production".to_string())],
        };
        insta::assert_snapshot!(
            dispatch.run_args().join(" "),
            @"workflow run deploy.yml --ref master -f environment=production"
        );
    }

    #[test]
    fn test_summary_deserialization() {
        let json = r#"[{
            "number": 42,
            "title": "Hotfix 1.2.2",
            "url": "https://github.com/acme/app/pull/42",
            "headRefName": "hotfix/1.2.2",
            "baseRefName": "master",
            "isDraft": false
        }]"#;
        let prs: Vec<PullRequestSummary> = serde_json::from_str(json).unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].number, 42);
        assert_eq!(prs[0].head_ref_name, "hotfix/1.2.2");
    }
}
