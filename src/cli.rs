//! CLI argument parsing module for depbot

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Parse a whole number of seconds (`600`, `600s`)
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let digits = s.strip_suffix('s').unwrap_or(s);
    if digits.is_empty() {
        return Err("empty duration".to_string());
    }
    let secs: u64 = digits
        .parse()
        .map_err(|_| format!("invalid number of seconds: {}", s))?;
    if secs == 0 {
        return Err("duration must be at least one second".to_string());
    }
    Ok(Duration::from_secs(secs))
}

/// Dependency update bot
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depbot",
    version,
    about = "Checks dependencies, regenerates manifests and lock files, and opens pull requests"
)]
pub struct CliArgs {
    /// Package manager (npm_and_yarn)
    pub package_manager: String,

    /// Repository (org/project/_git/repo)
    pub repo: String,

    // Source options
    /// Directory holding the dependency files
    #[arg(long, default_value = "/")]
    pub dir: String,

    /// Target branch (default: the repository's default branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// Base commit to read files from (default: the branch tip)
    #[arg(long)]
    pub commit: Option<String>,

    // Credentials
    /// Azure DevOps access token
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub azure_token: Option<String>,

    /// Private registry access token
    #[arg(long, env = "REGISTRY_ACCESS_TOKEN", hide_env_values = true)]
    pub registry_token: Option<String>,

    /// GitHub access token, used for github.com sources
    #[arg(long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    pub github_access_token: Option<String>,

    // Selection
    /// Update only this dependency (top-level or not)
    #[arg(long)]
    pub dep: Option<String>,

    /// Dependencies never to update (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclusions: Vec<String>,

    /// Version ranges never proposed as update targets (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub ignore_versions: Vec<String>,

    /// Maximum number of pull requests to open
    #[arg(long)]
    pub pr_count: Option<String>,

    // Update behaviour
    /// Only update lock files; never relax requirements
    #[arg(long)]
    pub lockfile_only: bool,

    /// Requirements update strategy
    #[arg(long, default_value = "auto")]
    pub requirements_update_strategy: String,

    /// Push a new commit onto this existing pull request instead of opening one
    #[arg(long, value_name = "NUMBER")]
    pub update_pull_request: Option<u64>,

    /// Do everything except writing to the provider
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    // Cache
    /// Stages to read from the local cache (files,dependencies)
    #[arg(long, default_value = "")]
    pub cache: String,

    /// Root directory of the local cache
    #[arg(long, default_value = "tmp")]
    pub cache_root: PathBuf,

    /// Write regenerated files into the local cache
    #[arg(long)]
    pub write: bool,

    /// User-level .npmrc to write registry credentials to (default: $HOME/.npmrc)
    #[arg(long)]
    pub npmrc_path: Option<PathBuf>,

    // Timeouts
    /// Time budget for each native tool run, in seconds
    #[arg(long, value_parser = parse_seconds, default_value = "600")]
    pub tool_timeout: Duration,

    /// Time budget for each HTTP request, in seconds
    #[arg(long, value_parser = parse_seconds, default_value = "30")]
    pub request_timeout: Duration,

    // Output options
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,
}
