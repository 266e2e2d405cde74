//! Immutable run configuration
//!
//! `RunConfig::from_cli` validates every input once; the result is passed by
//! reference to the controller and from there to every component.

use crate::cache::CacheStage;
use crate::cli::CliArgs;
use crate::domain::{
    Credential, Credentials, PackageManager, ProviderKind, RequirementsUpdateStrategy,
    SecurityAdvisory, Source,
};
use crate::ecosystem::npm::npmrc;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Host of the GitHub git-source credential
pub const GITHUB_HOST: &str = "github.com";

/// Validated inputs of one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub package_manager: PackageManager,
    pub source: Source,
    /// Process only this dependency
    pub dependency: Option<String>,
    /// Dependencies never passed to the decision engine
    pub exclusions: Vec<String>,
    /// Maximum number of newly created pull requests; unbounded when absent
    pub pr_count: Option<usize>,
    pub lockfile_only: bool,
    pub requirements_update_strategy: Option<RequirementsUpdateStrategy>,
    pub update_pull_request: Option<u64>,
    pub dry_run: bool,
    /// Stages read back from the cache
    pub cache_stages: Vec<CacheStage>,
    pub cache_root: PathBuf,
    /// Write regenerated files into the cache
    pub write: bool,
    /// Git-source credentials; registry credentials are added once `.npmrc` is known
    pub credentials: Credentials,
    pub registry_token: String,
    /// User-level `.npmrc` receiving registry entries; not written when absent
    pub npmrc_path: Option<PathBuf>,
    pub security_advisories: Vec<SecurityAdvisory>,
    /// Version ranges never proposed as update targets
    pub ignored_versions: Vec<String>,
    pub tool_timeout: Duration,
    pub request_timeout: Duration,
}

impl RunConfig {
    /// Validates CLI arguments into a run configuration
    pub fn from_cli(args: &CliArgs) -> Result<Self, ConfigError> {
        if args.quiet && args.verbose {
            return Err(ConfigError::ConflictingOptions {
                message: "--quiet and --verbose cannot be used together".to_string(),
            });
        }

        let package_manager: PackageManager = required(&args.package_manager, "package manager")?.parse()?;
        let repo = required(&args.repo, "repo")?;
        let azure_token = required_opt(args.azure_token.as_deref(), "repo token")?;
        let registry_token = required_opt(args.registry_token.as_deref(), "registry token")?;

        let pr_count = args.pr_count.as_deref().map(parse_pr_count).transpose()?;
        let requirements_update_strategy =
            RequirementsUpdateStrategy::parse_override(&args.requirements_update_strategy)?;

        let mut credentials = Credentials::new();
        credentials.push(Credential::git_source(ProviderKind::Azure.hostname(), azure_token));
        if let Some(token) = args.github_access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            credentials.push(Credential::git_source(GITHUB_HOST, token));
        }

        let source = Source::new(
            ProviderKind::Azure,
            repo,
            &args.dir,
            non_blank(args.branch.as_deref()),
            non_blank(args.commit.as_deref()),
        );

        Ok(Self {
            package_manager,
            source,
            dependency: non_blank(args.dep.as_deref()),
            exclusions: trimmed(&args.exclusions),
            pr_count,
            lockfile_only: args.lockfile_only,
            requirements_update_strategy,
            update_pull_request: args.update_pull_request,
            dry_run: args.dry_run,
            cache_stages: CacheStage::parse_list(&args.cache)?,
            cache_root: args.cache_root.clone(),
            write: args.write,
            credentials,
            registry_token: registry_token.to_string(),
            npmrc_path: args.npmrc_path.clone().or_else(npmrc::default_npmrc_path),
            security_advisories: Vec::new(),
            ignored_versions: trimmed(&args.ignore_versions),
            tool_timeout: args.tool_timeout,
            request_timeout: args.request_timeout,
        })
    }

    /// Git-source credentials followed by registry credentials for every registry in `.npmrc`
    pub fn credentials_with_registries(&self, npmrc_content: Option<&str>) -> Credentials {
        let mut credentials = self.credentials.clone();
        credentials.extend(npmrc::registry_credentials(npmrc_content, &self.registry_token));
        credentials
    }

    /// Returns true if the dependency is in the exclusion set
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.iter().any(|e| e == name)
    }
}

fn required<'a>(value: &'a str, name: &str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::missing(name));
    }
    Ok(value)
}

fn required_opt<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ConfigError> {
    required(value.unwrap_or_default(), name)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_pr_count(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ConfigError::InvalidPrCount {
            value: value.to_string(),
        }),
    }
}
