use anyhow::{Context, Result};
use clap::Parser;
use heycx::cli::{Cli, Commands, HotfixCommand, PrCommand};
use heycx::config::REPO_CONFIG_FILE;
use heycx::error::{user_friendly_error, FlowError};
use heycx::git::{check_git_version, GitClient};
use heycx::github::{check_gh_version, GitHubClient};
use heycx::workflow::{FinishOptions, HotfixStatus, PrOptions, Workflow};
use heycx::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("{:?}", e);
            user_friendly_error(&e).display();
            let code = e
                .downcast_ref::<FlowError>()
                .map(FlowError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Could not determine current directory")?;

    info!("Checking git");
    let git = GitClient::new(&cwd)?;
    let version = check_git_version(&git)?;
    info!("Using git version {}", version);

    let repo_root = git.work_tree()?;

    match cli.command {
        Commands::Init { output, force } => init_command(&repo_root, output, force),
        Commands::Hotfix { command } => {
            let config = load_config(cli.config.as_deref(), &repo_root)?;
            let workflow = Workflow::new(&git, &config)?;
            match command {
                HotfixCommand::Start { name } => hotfix_start(&workflow, name.as_deref()),
                HotfixCommand::Finish {
                    name,
                    no_push,
                    no_deploy,
                } => {
                    let options = FinishOptions {
                        push: !no_push,
                        deploy: !no_deploy,
                    };
                    // Check gh up front so a missing CLI fails before any merge
                    let gh = if options.deploy && config.deploy.workflow.is_some() {
                        let gh = github_client(&repo_root)?;
                        gh.ensure_authenticated()?;
                        Some(gh)
                    } else {
                        None
                    };
                    hotfix_finish(&workflow, name.as_deref(), options, gh.as_ref())
                }
                HotfixCommand::Status => hotfix_status(&workflow),
            }
        }
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
            let config = load_config(cli.config.as_deref(), &repo_root)?;
            let workflow = Workflow::new(&git, &config)?;
            let gh = github_client(&repo_root)?;
            let options = PrOptions {
                title,
                body,
                base,
                draft,
                push: !no_push,
            };
            pr_create(&workflow, &gh, options)
        }
        Commands::Sync => {
            let config = load_config(cli.config.as_deref(), &repo_root)?;
            let workflow = Workflow::new(&git, &config)?;
            sync(&workflow)
        }
    }
}

fn load_config(path: Option<&Path>, repo_root: &Path) -> Result<Config> {
    info!("Loading configuration");
    Config::load(path, Some(repo_root)).context("Failed to load configuration")
}

/// Locate gh and check its version
fn github_client(work_dir: &Path) -> Result<GitHubClient> {
    info!("Checking GitHub CLI");
    let gh = GitHubClient::new(work_dir)?;
    let version = check_gh_version(&gh)?;
    info!("Using gh version {}", version);
    Ok(gh)
}

fn hotfix_start(workflow: &Workflow, name: Option<&str>) -> Result<()> {
    let report = workflow.hotfix_start(name)?;

    println!("✓ Created {} from {}", report.branch, report.base);
    if let Some(version) = report.version {
        println!("  Version: {}", version);
    }
    println!("\nCommit your fix, then run 'heycx hotfix finish'");
    Ok(())
}

fn hotfix_finish(
    workflow: &Workflow,
    name: Option<&str>,
    options: FinishOptions,
    gh: Option<&GitHubClient>,
) -> Result<()> {
    let report = workflow.hotfix_finish(name, options, gh)?;

    for target in &report.merged_into {
        println!("✓ Merged {} into {}", report.branch, target);
    }
    if let Some(tag) = &report.tag {
        println!("🏷  Tagged {}", tag);
    }
    if report.pushed {
        println!("⬆️  Pushed to remote");
    } else {
        println!("ℹ️  Changes are local only; push when ready");
    }
    if report.deleted_local {
        println!("🧹 Deleted {}", report.branch);
    }
    if let Some(workflow_name) = &report.deployed {
        println!("🚀 Triggered deployment workflow {}", workflow_name);
    }
    Ok(())
}

fn hotfix_status(workflow: &Workflow) -> Result<()> {
    match workflow.hotfix_status()? {
        HotfixStatus::None => println!("No hotfix in progress"),
        HotfixStatus::Active(session) => {
            println!("🔧 Hotfix in progress: {}", session.branch);
            println!("   Base: {}", session.base);
            if let Some(version) = session.version {
                println!("   Version: {}", version);
            }
            println!("   Started: {}", session.started_at.strftime("%Y-%m-%d %H:%M"));
        }
        HotfixStatus::Stale(session) => {
            println!(
                "⚠️  Recorded hotfix {} no longer exists; it will be discarded by the next 'heycx hotfix start'",
                session.branch
            );
        }
    }
    Ok(())
}

fn pr_create(workflow: &Workflow, gh: &GitHubClient, options: PrOptions) -> Result<()> {
    let report = workflow.create_pull_request(gh, options)?;

    if report.created {
        println!("✓ Opened pull request {} → {}", report.head, report.base);
    } else {
        println!("ℹ️  A pull request for {} → {} is already open", report.head, report.base);
    }
    println!("{}", report.url);
    Ok(())
}

fn sync(workflow: &Workflow) -> Result<()> {
    let report = workflow.sync()?;

    for (branch, outcome) in &report.branches {
        println!("✓ {}: {}", branch, outcome);
    }
    if let Some(branch) = report.returned_to {
        println!("Back on {}", branch);
    }
    Ok(())
}

fn init_command(repo_root: &Path, output: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = output.unwrap_or_else(|| repo_root.join(REPO_CONFIG_FILE));

    if config_path.exists() && !force {
        println!("Configuration file already exists at: {:?}", config_path);
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let config_str =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize config")?;

    std::fs::write(&config_path, config_str)
        .with_context(|| format!("Failed to write config to {:?}", config_path))?;

    println!("✓ Configuration created at: {:?}", config_path);
    println!("\nNext steps:");
    println!("1. Set [deploy] workflow to enable deployment triggers on 'heycx hotfix finish'");
    println!("2. Run 'gh auth login' if not already authenticated");
    Ok(())
}
