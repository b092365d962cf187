use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "heycx",
    about = "heycx - Opinionated utility toolkit that makes developer life better",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "HEYCX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hotfix branch workflow
    Hotfix {
        #[command(subcommand)]
        command: HotfixCommand,
    },

    /// Pull request helpers (requires gh)
    Pr {
        #[command(subcommand)]
        command: PrCommand,
    },

    /// Update master & develop branches from the remote
    Sync,

    /// Write a default .heycx.toml configuration
    Init {
        /// Where to write the configuration file (defaults to the repository root)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum HotfixCommand {
    /// Start a new hotfix branch
    Start {
        /// Hotfix name; defaults to the next patch version after the latest tag
        name: Option<String>,
    },

    /// Complete hotfix (merge to master & develop)
    Finish {
        /// Hotfix to finish; defaults to the active one
        name: Option<String>,

        /// Merge and tag locally without pushing
        #[arg(long)]
        no_push: bool,

        /// Skip the deployment trigger
        #[arg(long)]
        no_deploy: bool,
    },

    /// Show the hotfix in progress
    Status,
}

#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Open a pull request for the current branch
    Create {
        /// Pull request title (defaults to the last commit subject)
        #[arg(short, long)]
        title: Option<String>,

        /// Pull request body
        #[arg(short, long)]
        body: Option<String>,

        /// Target branch
        #[arg(long)]
        base: Option<String>,

        /// Open as draft
        #[arg(long)]
        draft: bool,

        /// Do not push the branch first
        #[arg(long)]
        no_push: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_hotfix_start() {
        let cli = Cli::parse_from(["heycx", "hotfix", "start"]);

        match cli.command {
            Commands::Hotfix {
                command: HotfixCommand::Start { name },
            } => assert!(name.is_none()),
            _ => panic!("Expected hotfix start"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parsing_hotfix_start_with_name() {
        let cli = Cli::parse_from(["heycx", "hotfix", "start", "1.2.2"]);

        match cli.command {
            Commands::Hotfix {
                command: HotfixCommand::Start { name },
            } => assert_eq!(name.as_deref(), Some("1.2.2")),
            _ => panic!("Expected hotfix start"),
        }
    }

    #[test]
    fn test_cli_parsing_hotfix_finish_flags() {
        let cli = Cli::parse_from(["heycx", "hotfix", "finish", "--no-push", "--no-deploy", "-vv"]);

        match cli.command {
            Commands::Hotfix {
                command:
                    HotfixCommand::Finish {
                        name,
                        no_push,
                        no_deploy,
                    },
            } => {
                assert!(name.is_none());
                assert!(no_push);
                assert!(no_deploy);
            }
            _ => panic!("Expected hotfix finish"),
        }
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_parsing_pr_create() {
        let cli = Cli::parse_from([
            "heycx", "pr", "create", "--title", "Fix login", "--base", "master", "--draft",
        ]);

        match cli.command {
            Commands::Pr {
                command:
                    PrCommand::Create {
                        title,
                        body,
                        base,
                        draft,
                        no_push,
                    },
            } => {
                assert_eq!(title.as_deref(), Some("Fix login"));
                assert!(body.is_none());
                assert_eq!(base.as_deref(), Some("master"));
                assert!(draft);
                assert!(!no_push);
            }
            _ => panic!("Expected pr create"),
        }
    }

    #[test]
    fn test_cli_parsing_sync_with_config() {
        let cli = Cli::parse_from(["heycx", "sync", "--config", "/path/to/config.toml"]);

        assert!(matches!(cli.command, Commands::Sync));
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_cli_rejects_unknown_subcommand() {
        let err = Cli::try_parse_from(["heycx", "deploy"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["heycx"]).is_err());
        assert!(Cli::try_parse_from(["heycx", "hotfix"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
