//! Run controller coordinating the whole update workflow
//!
//! This module provides:
//! - Workflow coordination: fetch → parse → select → decide → regenerate → submit
//! - Staged caching of the fetched files and parsed dependencies
//! - Exclusions, the pull request budget and run-level cancellation
//! - Per-dependency failure isolation; only fatal errors end the run

use crate::cache::{CacheStage, DependenciesStage, StagedCache};
use crate::config::RunConfig;
use crate::decision::{Decision, DecisionEngine};
use crate::domain::{
    Dependency, DependencyOutcome, FileSnapshot, PullRequestStatus, RunSummary, SkipReason,
};
use crate::ecosystem::npm::npmrc::{npmrc_entries, NpmrcGuard};
use crate::ecosystem::{Ecosystem, EcosystemOptions, FileFetcher, FileParser, FileUpdater};
use crate::error::{AppError, ProviderError, UpdaterError};
use crate::http::HttpClient;
use crate::progress::Progress;
use crate::provider::Provider;
use crate::pull_request::{PullRequestCreator, PullRequestRecord, PullRequestUpdater};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives one run over one repository directory
pub struct RunController<'a> {
    config: &'a RunConfig,
    ecosystem: Arc<dyn Ecosystem>,
    provider: Arc<dyn Provider>,
    http: HttpClient,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
}

impl<'a> RunController<'a> {
    /// Creates a controller; progress display is off until enabled
    pub fn new(
        config: &'a RunConfig,
        ecosystem: Arc<dyn Ecosystem>,
        provider: Arc<dyn Provider>,
        http: HttpClient,
    ) -> Self {
        Self {
            config,
            ecosystem,
            provider,
            http,
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    /// Uses `flag` to stop the run before the next dependency (builder pattern)
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Enables the progress bar (builder pattern)
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Runs the workflow; per-dependency failures are recorded in the summary
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let config = self.config;
        let source = &config.source;
        let mut progress = Progress::new(self.show_progress);
        let mut summary = RunSummary::new(config.dry_run);

        info!(
            repo = %source.repo,
            directory = %source.directory,
            branch = source.branch.as_deref().unwrap_or("(default)"),
            package_manager = %config.package_manager,
            dry_run = config.dry_run,
            "starting run"
        );

        let cache = StagedCache::new(
            &config.cache_root,
            source,
            config.package_manager,
            config.cache_stages.clone(),
        );

        // Step 1: Fetch dependency files
        progress.spinner("Fetching dependency files...");
        let fetcher = self.ecosystem.fetcher(source, self.provider.clone());
        let file_fetcher = fetcher.as_ref();
        let snapshot = cache
            .read_or_fetch_files(move || async move { file_fetcher.files().await.map_err(AppError::from) })
            .await?;

        // Step 2: Registry credentials and the scoped user-level .npmrc
        let npmrc_content = snapshot.get(".npmrc").map(|f| f.content.clone());
        let credentials = config.credentials_with_registries(npmrc_content.as_deref());
        let _npmrc = self.install_npmrc(npmrc_content.as_deref())?;

        let options = EcosystemOptions {
            http: self.http.clone(),
            credentials,
            requirements_update_strategy: config.requirements_update_strategy,
            security_advisories: config.security_advisories.clone(),
            ignored_versions: config.ignored_versions.clone(),
            tool_timeout: config.tool_timeout,
        };

        // Step 3: Parse
        progress.spinner("Parsing dependency files...");
        let parser = self.ecosystem.parser();
        let dependencies = parse_dependencies(&cache, parser.as_ref(), &snapshot).await?;

        let selected = self.select(&dependencies);
        info!(
            parsed = dependencies.len(),
            selected = selected.len(),
            "dependencies to check"
        );

        // Step 4: Decide, regenerate and submit one dependency at a time
        let factory = self.ecosystem.checker_factory(&options);
        let updater = self.ecosystem.updater(&options);
        let pipeline = Pipeline {
            config,
            provider: self.provider.as_ref(),
            fetcher: fetcher.as_ref(),
            engine: DecisionEngine::new(
                factory.as_ref(),
                &snapshot,
                &dependencies,
                config.lockfile_only,
            ),
            updater: updater.as_ref(),
            snapshot: &snapshot,
            cache: &cache,
        };

        progress.start(selected.len() as u64, "Checking dependencies");
        for dependency in &selected {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(remaining = selected.len() - summary.outcomes.len(), "run cancelled");
                summary.cancelled = true;
                break;
            }
            if let Some(max) = config.pr_count {
                if summary.pull_requests_counted() >= max {
                    info!(max, "pull request budget exhausted");
                    summary.budget_exhausted = true;
                    break;
                }
            }

            progress.set_message(&dependency.name);
            let outcome = if config.is_excluded(&dependency.name) {
                info!(dependency = %dependency.name, "excluded");
                DependencyOutcome::skipped(&dependency.name, SkipReason::Excluded)
            } else {
                match pipeline.process(dependency).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => failure(dependency, e),
                }
            };
            debug!(outcome = %outcome, "dependency processed");
            summary.add(outcome);
            progress.inc();
        }
        progress.finish_and_clear();

        info!(
            updated = summary.updated_count(),
            skipped = summary.skipped_count(),
            failed = summary.failed_count(),
            pull_requests = summary.pull_requests_created(),
            "run finished"
        );
        Ok(summary)
    }

    /// With `--dep`, only that dependency; otherwise every top-level dependency
    fn select(&self, dependencies: &[Dependency]) -> Vec<Dependency> {
        match self.config.dependency {
            Some(ref name) => {
                let selected: Vec<Dependency> = dependencies
                    .iter()
                    .filter(|d| &d.name == name)
                    .cloned()
                    .collect();
                if selected.is_empty() {
                    warn!(dependency = %name, "dependency not found in the dependency files");
                }
                selected
            }
            None => dependencies.iter().filter(|d| d.top_level).cloned().collect(),
        }
    }

    fn install_npmrc(&self, npmrc_content: Option<&str>) -> Result<Option<NpmrcGuard>, AppError> {
        let (Some(content), Some(path)) = (npmrc_content, self.config.npmrc_path.as_ref()) else {
            return Ok(None);
        };
        let entries = npmrc_entries(content, &self.config.registry_token);
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(NpmrcGuard::install(path, &entries)?))
    }
}

/// Parses through the cache; cached dependencies from another snapshot are re-parsed
async fn parse_dependencies(
    cache: &StagedCache,
    parser: &dyn FileParser,
    snapshot: &FileSnapshot,
) -> Result<Vec<Dependency>, AppError> {
    let parse = move || async move { parser.parse(snapshot).map_err(AppError::from) };
    let dependencies = cache.read_or_compute::<DependenciesStage, _, _, _>(parse).await?;

    let fingerprint = snapshot.fingerprint();
    if dependencies
        .iter()
        .all(|d| d.snapshot.as_deref() == Some(fingerprint.as_str()))
    {
        return Ok(dependencies);
    }

    warn!("cached dependencies were parsed from other files; parsing again");
    cache.invalidate(CacheStage::Dependencies)?;
    cache.read_or_compute::<DependenciesStage, _, _, _>(parse).await
}

fn failure(dependency: &Dependency, e: AppError) -> DependencyOutcome {
    match &e {
        AppError::Updater(UpdaterError::NoFunctionalChange {
            updated_files,
            dependency_files,
            ..
        }) => error!(
            dependency = %dependency.name,
            updated_files = ?updated_files,
            dependency_files = ?dependency_files,
            error = %e,
            "regeneration produced no change"
        ),
        AppError::Provider(ProviderError::Api { status, .. }) => {
            error!(dependency = %dependency.name, status = *status, error = %e, "provider rejected the update")
        }
        _ => warn!(dependency = %dependency.name, error = %e, "dependency failed"),
    }
    DependencyOutcome::failed(&dependency.name, e.to_string(), e.is_timeout())
}

/// Per-dependency body over one snapshot
struct Pipeline<'p> {
    config: &'p RunConfig,
    provider: &'p dyn Provider,
    fetcher: &'p dyn FileFetcher,
    engine: DecisionEngine<'p>,
    updater: &'p dyn FileUpdater,
    snapshot: &'p FileSnapshot,
    cache: &'p StagedCache,
}

impl Pipeline<'_> {
    async fn process(&self, dependency: &Dependency) -> Result<DependencyOutcome, AppError> {
        let (level, updated) = match self.engine.decide(dependency).await? {
            Decision::Skip(reason) => {
                return Ok(DependencyOutcome::skipped(&dependency.name, reason));
            }
            Decision::Accept { level, updated } => (level, updated),
        };

        let files = self
            .updater
            .updated_dependency_files(self.snapshot, &updated)
            .await?;
        info!(
            dependency = %dependency.name,
            files = ?files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            "regenerated dependency files"
        );

        if self.config.write {
            self.cache.write_through(&files)?;
        }

        let base_commit = self.fetcher.commit().await?;
        let record = PullRequestRecord::build(
            &self.config.source,
            self.config.package_manager,
            &updated,
            files,
            base_commit,
        );
        let pull_request = self.submit(&record).await?;
        info!(dependency = %dependency.name, pull_request = %pull_request, "submitted");

        Ok(DependencyOutcome::Updated {
            dependency: dependency.name.clone(),
            previous_version: dependency.version.clone(),
            new_version: updated.first().and_then(|d| d.version.clone()),
            unlock_level: level,
            files: record.file_names(),
            pull_request,
        })
    }

    async fn submit(&self, record: &PullRequestRecord) -> Result<PullRequestStatus, ProviderError> {
        if self.config.dry_run {
            info!(branch = %record.branch_name, title = %record.title, "dry run: not submitting");
            return Ok(PullRequestStatus::NotSubmitted {
                branch: record.branch_name.clone(),
            });
        }

        match self.config.update_pull_request {
            Some(number) => {
                PullRequestUpdater::new(self.provider, number)
                    .update(&record.base_commit, &record.commit_message, &record.files)
                    .await
            }
            None => {
                PullRequestCreator::new(self.provider, &self.config.source)
                    .create(record)
                    .await
            }
        }
    }
}
