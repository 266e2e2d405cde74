//! Integration tests for the run pipeline
//!
//! These tests verify:
//! - Decide → regenerate → submit for an accepted update
//! - Up-to-date, peer-conflict and excluded dependencies are skipped
//! - Pull request idempotency, the pull request budget and dry runs
//! - Cancellation, write-through and per-dependency failure isolation

use async_trait::async_trait;
use depbot::cache::StagedCache;
use depbot::config::RunConfig;
use depbot::controller::RunController;
use depbot::domain::{
    Credentials, Dependency, DependencyFile, DependencyOutcome, FileSnapshot, FileType,
    PackageManager, ProviderKind, PullRequestStatus, Requirement, RunSummary, SkipReason, Source,
    UnlockLevel,
};
use depbot::ecosystem::{
    CheckerFactory, Ecosystem, EcosystemOptions, FileFetcher, FileParser, FileUpdater,
    UpdateChecker,
};
use depbot::error::{AppError, CheckerError, FetchError, RegistryError, UpdaterError};
use depbot::http::HttpClient;
use depbot::provider::{MemoryProvider, Provider};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const BASE_COMMIT: &str = "abc123";

const PACKAGE_JSON: &str = r#"{
  "name": "shop",
  "dependencies": {
    "left-pad": "^1.0.0",
    "core-util": "^2.1.0",
    "widget": "^1.0.0",
    "widget-plugin": "^1.0.0"
  }
}
"#;

const PACKAGE_LOCK: &str = r#"{
  "packages": {
    "node_modules/left-pad": { "version": "1.0.0" },
    "node_modules/core-util": { "version": "2.1.0" },
    "node_modules/widget": { "version": "1.0.0" },
    "node_modules/widget-plugin": { "version": "1.0.0" }
  }
}
"#;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// What the scripted checker answers for one dependency
#[derive(Clone, Default)]
struct Script {
    up_to_date: bool,
    updatable_at: Vec<UnlockLevel>,
    updated: Vec<Dependency>,
    timeout: bool,
}

struct ScriptedChecker {
    dependency: Dependency,
    script: Script,
}

impl ScriptedChecker {
    fn registry_result(&self) -> Result<(), CheckerError> {
        if self.script.timeout {
            return Err(RegistryError::timeout(&self.dependency.name, "npm").into());
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateChecker for ScriptedChecker {
    fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    async fn latest_version(&self) -> Result<Option<String>, CheckerError> {
        self.registry_result()?;
        Ok(self.script.updated.first().and_then(|d| d.version.clone()))
    }

    async fn latest_resolvable_version(&self) -> Result<Option<String>, CheckerError> {
        self.latest_version().await
    }

    async fn up_to_date(&self) -> Result<bool, CheckerError> {
        Ok(self.script.up_to_date)
    }

    async fn can_update(&self, level: UnlockLevel) -> Result<bool, CheckerError> {
        Ok(self.script.updatable_at.contains(&level))
    }

    async fn updated_dependencies(&self, _level: UnlockLevel) -> Result<Vec<Dependency>, CheckerError> {
        Ok(self.script.updated.clone())
    }

    fn requirements_unlocked_or_can_be(&self) -> bool {
        true
    }
}

/// Hands out scripted checkers and records every dependency it was asked about
#[derive(Default)]
struct ScriptedFactory {
    scripts: HashMap<String, Script>,
    checked: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    fn with(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

impl CheckerFactory for ScriptedFactory {
    fn checker(
        &self,
        dependency: &Dependency,
        _snapshot: &FileSnapshot,
        _dependencies: &[Dependency],
    ) -> Box<dyn UpdateChecker> {
        self.checked.lock().unwrap().push(dependency.name.clone());
        Box::new(ScriptedChecker {
            dependency: dependency.clone(),
            script: self.scripts.get(&dependency.name).cloned().unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
struct StaticFetcher {
    snapshot: FileSnapshot,
    fail: bool,
}

#[async_trait]
impl FileFetcher for StaticFetcher {
    async fn files(&self) -> Result<FileSnapshot, FetchError> {
        if self.fail {
            return Err(FetchError::FileNotFound {
                path: "/package.json".to_string(),
            });
        }
        Ok(self.snapshot.clone())
    }

    async fn npmrc_content(&self) -> Result<Option<String>, FetchError> {
        Ok(self.snapshot.get(".npmrc").map(|f| f.content.clone()))
    }

    async fn commit(&self) -> Result<String, FetchError> {
        Ok(BASE_COMMIT.to_string())
    }
}

struct StaticParser {
    dependencies: Vec<Dependency>,
}

impl FileParser for StaticParser {
    fn parse(&self, snapshot: &FileSnapshot) -> Result<Vec<Dependency>, FetchError> {
        let fingerprint = snapshot.fingerprint();
        Ok(self
            .dependencies
            .iter()
            .cloned()
            .map(|d| d.with_snapshot(fingerprint.clone()))
            .collect())
    }
}

/// Rewrites requirement text in the manifest and versions in the lock file
struct RewritingUpdater;

#[async_trait]
impl FileUpdater for RewritingUpdater {
    async fn updated_dependency_files(
        &self,
        snapshot: &FileSnapshot,
        dependencies: &[Dependency],
    ) -> Result<Vec<DependencyFile>, UpdaterError> {
        let mut changed = Vec::new();

        for file in snapshot.files() {
            let mut content = file.content.clone();
            for dep in dependencies {
                let previous = dep.previous_state();
                match file.file_type {
                    FileType::Manifest => {
                        if let (Some(old), Some(new)) =
                            (previous.requirement_in(&file.name), dep.requirement_in(&file.name))
                        {
                            content = content.replace(
                                &format!("\"{}\": \"{}\"", dep.name, old),
                                &format!("\"{}\": \"{}\"", dep.name, new),
                            );
                        }
                    }
                    FileType::Lockfile => {
                        if let (Some(old), Some(new)) = (&previous.version, &dep.version) {
                            content = content.replace(
                                &format!("node_modules/{}\": {{ \"version\": \"{}\"", dep.name, old),
                                &format!("node_modules/{}\": {{ \"version\": \"{}\"", dep.name, new),
                            );
                        }
                    }
                    FileType::Support => {}
                }
            }
            if content != file.content {
                changed.push(file.with_content(content));
            }
        }

        if changed.is_empty() {
            return Err(UpdaterError::NoFunctionalChange {
                message: "No files were updated!".to_string(),
                dependencies: dependencies
                    .iter()
                    .map(|d| d.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                updated_files: Vec::new(),
                dependency_files: snapshot.names(),
            });
        }
        Ok(changed)
    }
}

struct FakeEcosystem {
    fetcher: StaticFetcher,
    dependencies: Vec<Dependency>,
    factory: Arc<ScriptedFactory>,
}

impl Ecosystem for FakeEcosystem {
    fn package_manager(&self) -> PackageManager {
        PackageManager::NpmAndYarn
    }

    fn fetcher(&self, _source: &Source, _provider: Arc<dyn Provider>) -> Box<dyn FileFetcher> {
        Box::new(self.fetcher.clone())
    }

    fn parser(&self) -> Box<dyn FileParser> {
        Box::new(StaticParser {
            dependencies: self.dependencies.clone(),
        })
    }

    fn checker_factory(&self, _options: &EcosystemOptions) -> Arc<dyn CheckerFactory> {
        self.factory.clone()
    }

    fn updater(&self, _options: &EcosystemOptions) -> Box<dyn FileUpdater> {
        Box::new(RewritingUpdater)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn snapshot() -> FileSnapshot {
    FileSnapshot::new(vec![
        DependencyFile::new("package.json", "/", PACKAGE_JSON, FileType::Manifest),
        DependencyFile::new("package-lock.json", "/", PACKAGE_LOCK, FileType::Lockfile),
    ])
}

fn dependency(name: &str, version: &str, requirement: &str) -> Dependency {
    Dependency::new(
        name,
        Some(version.to_string()),
        vec![Requirement::new(
            "package.json",
            requirement,
            vec!["dependencies".to_string()],
        )],
        PackageManager::NpmAndYarn,
    )
}

/// Post-update value of `dep` at `version` with a caret requirement on it
fn bumped(dep: &Dependency, version: &str) -> Dependency {
    let requirements = dep
        .requirements
        .iter()
        .map(|r| r.with_requirement(format!("^{}", version)))
        .collect();
    dep.updated(version, requirements)
}

fn left_pad() -> Dependency {
    dependency("left-pad", "1.0.0", "^1.0.0")
}

fn core_util() -> Dependency {
    dependency("core-util", "2.1.0", "^2.1.0")
}

fn widget() -> Dependency {
    dependency("widget", "1.0.0", "^1.0.0")
}

fn widget_plugin() -> Dependency {
    dependency("widget-plugin", "1.0.0", "^1.0.0")
}

fn updatable(dep: &Dependency, version: &str) -> Script {
    Script {
        updatable_at: vec![UnlockLevel::Own],
        updated: vec![bumped(dep, version)],
        ..Script::default()
    }
}

fn up_to_date() -> Script {
    Script {
        up_to_date: true,
        ..Script::default()
    }
}

fn source() -> Source {
    Source::new(
        ProviderKind::Azure,
        "contoso/web/_git/shop",
        "/",
        None,
        None,
    )
}

fn config(cache_root: &Path) -> RunConfig {
    RunConfig {
        package_manager: PackageManager::NpmAndYarn,
        source: source(),
        dependency: None,
        exclusions: Vec::new(),
        pr_count: None,
        lockfile_only: false,
        requirements_update_strategy: None,
        update_pull_request: None,
        dry_run: false,
        cache_stages: Vec::new(),
        cache_root: cache_root.to_path_buf(),
        write: false,
        credentials: Credentials::new(),
        registry_token: "registry-secret".to_string(),
        npmrc_path: None,
        security_advisories: Vec::new(),
        ignored_versions: Vec::new(),
        tool_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
    }
}

fn ecosystem(dependencies: Vec<Dependency>, factory: Arc<ScriptedFactory>) -> Arc<FakeEcosystem> {
    Arc::new(FakeEcosystem {
        fetcher: StaticFetcher {
            snapshot: snapshot(),
            fail: false,
        },
        dependencies,
        factory,
    })
}

async fn run(
    config: &RunConfig,
    ecosystem: Arc<FakeEcosystem>,
    provider: Arc<MemoryProvider>,
) -> Result<RunSummary, AppError> {
    let http = HttpClient::new().unwrap();
    RunController::new(config, ecosystem, provider, http).run().await
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

mod decisions {
    use super::*;

    #[tokio::test]
    async fn test_accepted_update_opens_pull_request() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let provider = Arc::new(MemoryProvider::new("main"));

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![left_pad()], factory),
            provider.clone(),
        )
        .await
        .unwrap();

        match summary.outcome_for("left-pad").unwrap() {
            DependencyOutcome::Updated {
                previous_version,
                new_version,
                unlock_level,
                files,
                pull_request,
                ..
            } => {
                assert_eq!(previous_version.as_deref(), Some("1.0.0"));
                assert_eq!(new_version.as_deref(), Some("1.3.0"));
                assert_eq!(*unlock_level, UnlockLevel::Own);
                assert_eq!(files, &vec!["package.json".to_string(), "package-lock.json".to_string()]);
                assert!(pull_request.is_created());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let commits = provider.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].branch, "depbot/npm_and_yarn/left-pad-1.3.0");
        assert_eq!(commits[0].base_commit, BASE_COMMIT);
        let manifest = commits[0].files.iter().find(|f| f.name == "package.json").unwrap();
        assert!(manifest.content.contains("\"left-pad\": \"^1.3.0\""));
        let lockfile = commits[0].files.iter().find(|f| f.name == "package-lock.json").unwrap();
        assert!(lockfile.content.contains("\"node_modules/left-pad\": { \"version\": \"1.3.0\""));

        let pull_requests = provider.created_pull_requests();
        assert_eq!(pull_requests.len(), 1);
        assert_eq!(pull_requests[0].title, "Bump left-pad from 1.0.0 to 1.3.0");
        assert_eq!(pull_requests[0].target_branch, "main");
        assert!(pull_requests[0].labels.contains(&"dependencies".to_string()));
        assert_eq!(summary.pull_requests_created(), 1);
    }

    #[tokio::test]
    async fn test_up_to_date_dependency_is_skipped_without_writes() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("core-util", up_to_date()));
        let provider = Arc::new(MemoryProvider::new("main"));

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![core_util()], factory),
            provider.clone(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary.outcome_for("core-util"),
            Some(&DependencyOutcome::skipped("core-util", SkipReason::UpToDate))
        );
        assert_eq!(provider.write_count(), 0);
    }

    #[tokio::test]
    async fn test_peer_that_can_update_alone_defers_the_target() {
        let temp = TempDir::new().unwrap();
        let widget_script = Script {
            updatable_at: vec![UnlockLevel::All],
            updated: vec![bumped(&widget(), "2.0.0"), bumped(&widget_plugin(), "2.0.0")],
            ..Script::default()
        };
        let factory = Arc::new(
            ScriptedFactory::default()
                .with("widget", widget_script)
                .with("widget-plugin", updatable(&widget_plugin(), "2.0.0")),
        );
        let provider = Arc::new(MemoryProvider::new("main"));

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![widget(), widget_plugin()], factory),
            provider.clone(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary.outcome_for("widget"),
            Some(&DependencyOutcome::skipped(
                "widget",
                SkipReason::PeerConflict {
                    peer: "widget-plugin".to_string()
                }
            ))
        );
        assert!(summary.outcome_for("widget-plugin").unwrap().is_updated());
        let pull_requests = provider.created_pull_requests();
        assert_eq!(pull_requests.len(), 1);
        assert_eq!(pull_requests[0].title, "Bump widget-plugin from 1.0.0 to 2.0.0");
    }

    #[tokio::test]
    async fn test_excluded_dependency_never_reaches_the_checker() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(
            ScriptedFactory::default()
                .with("left-pad", updatable(&left_pad(), "1.3.0"))
                .with("core-util", up_to_date()),
        );
        let provider = Arc::new(MemoryProvider::new("main"));
        let mut config = config(temp.path());
        config.exclusions = vec!["left-pad".to_string()];

        let summary = run(
            &config,
            ecosystem(vec![left_pad(), core_util()], factory.clone()),
            provider.clone(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary.outcome_for("left-pad"),
            Some(&DependencyOutcome::skipped("left-pad", SkipReason::Excluded))
        );
        assert_eq!(factory.checked(), vec!["core-util".to_string()]);
        assert_eq!(provider.write_count(), 0);
    }

    #[tokio::test]
    async fn test_only_selected_dependency_is_checked() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("core-util", up_to_date()));
        let provider = Arc::new(MemoryProvider::new("main"));
        let mut config = config(temp.path());
        config.dependency = Some("core-util".to_string());

        let summary = run(
            &config,
            ecosystem(vec![left_pad(), core_util()], factory.clone()),
            provider,
        )
        .await
        .unwrap();

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(factory.checked(), vec!["core-util".to_string()]);
    }

    #[tokio::test]
    async fn test_transitive_dependencies_are_not_selected_by_default() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("core-util", up_to_date()));
        let transitive = Dependency::transitive("is-odd", "3.0.1", PackageManager::NpmAndYarn);

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![core_util(), transitive], factory.clone()),
            Arc::new(MemoryProvider::new("main")),
        )
        .await
        .unwrap();

        assert_eq!(summary.outcomes.len(), 1);
        assert!(summary.outcome_for("is-odd").is_none());
    }
}

mod pull_requests {
    use super::*;

    #[tokio::test]
    async fn test_second_run_finds_pull_request_already_open() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let provider = Arc::new(MemoryProvider::new("main"));
        let config = config(temp.path());

        let first = run(&config, ecosystem(vec![left_pad()], factory.clone()), provider.clone())
            .await
            .unwrap();
        let second = run(&config, ecosystem(vec![left_pad()], factory), provider.clone())
            .await
            .unwrap();

        assert_eq!(first.pull_requests_created(), 1);
        assert_eq!(second.pull_requests_created(), 0);
        match second.outcome_for("left-pad").unwrap() {
            DependencyOutcome::Updated { pull_request, .. } => assert_eq!(
                pull_request,
                &PullRequestStatus::AlreadyOpen {
                    branch: "depbot/npm_and_yarn/left-pad-1.3.0".to_string()
                }
            ),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(provider.commits().len(), 1);
        assert_eq!(provider.created_pull_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_budget_counts_only_created_pull_requests() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(
            ScriptedFactory::default()
                .with("left-pad", updatable(&left_pad(), "1.3.0"))
                .with("widget", updatable(&widget(), "1.1.0"))
                .with("widget-plugin", updatable(&widget_plugin(), "1.1.0")),
        );
        let provider = Arc::new(MemoryProvider::new("main"));
        provider.add_branch("depbot/npm_and_yarn/left-pad-1.3.0", "commit-0");
        provider.add_pull_request(1, "depbot/npm_and_yarn/left-pad-1.3.0", "main");
        let mut config = config(temp.path());
        config.pr_count = Some(1);

        let summary = run(
            &config,
            ecosystem(vec![left_pad(), widget(), widget_plugin()], factory.clone()),
            provider.clone(),
        )
        .await
        .unwrap();

        assert!(summary.budget_exhausted);
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.pull_requests_created(), 1);
        assert!(summary.outcome_for("widget").unwrap().created_pull_request());
        assert!(summary.outcome_for("widget-plugin").is_none());
        assert!(!factory.checked().contains(&"widget-plugin".to_string()));
    }

    #[tokio::test]
    async fn test_dry_run_performs_no_provider_writes() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let provider = Arc::new(MemoryProvider::new("main"));
        let mut config = config(temp.path());
        config.dry_run = true;

        let summary = run(&config, ecosystem(vec![left_pad()], factory), provider.clone())
            .await
            .unwrap();

        assert!(summary.dry_run);
        match summary.outcome_for("left-pad").unwrap() {
            DependencyOutcome::Updated { pull_request, .. } => assert_eq!(
                pull_request,
                &PullRequestStatus::NotSubmitted {
                    branch: "depbot/npm_and_yarn/left-pad-1.3.0".to_string()
                }
            ),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(provider.write_count(), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_budget_counts_planned_pull_requests() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(
            ScriptedFactory::default()
                .with("left-pad", updatable(&left_pad(), "1.3.0"))
                .with("widget", updatable(&widget(), "1.1.0"))
                .with("widget-plugin", updatable(&widget_plugin(), "1.1.0")),
        );
        let provider = Arc::new(MemoryProvider::new("main"));
        let mut config = config(temp.path());
        config.dry_run = true;
        config.pr_count = Some(1);

        let summary = run(
            &config,
            ecosystem(vec![left_pad(), widget(), widget_plugin()], factory.clone()),
            provider.clone(),
        )
        .await
        .unwrap();

        assert!(summary.budget_exhausted);
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.pull_requests_created(), 0);
        assert_eq!(summary.pull_requests_counted(), 1);
        assert!(!factory.checked().contains(&"widget".to_string()));
        assert_eq!(provider.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_pull_request_pushes_to_its_branch() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let provider = Arc::new(MemoryProvider::new("main"));
        provider.add_pull_request(7, "depbot/npm_and_yarn/left-pad-1.2.0", "main");
        let mut config = config(temp.path());
        config.update_pull_request = Some(7);

        let summary = run(&config, ecosystem(vec![left_pad()], factory), provider.clone())
            .await
            .unwrap();

        match summary.outcome_for("left-pad").unwrap() {
            DependencyOutcome::Updated { pull_request, .. } => assert_eq!(
                pull_request,
                &PullRequestStatus::Updated {
                    number: 7,
                    branch: "depbot/npm_and_yarn/left-pad-1.2.0".to_string()
                }
            ),
            other => panic!("unexpected outcome: {:?}", other),
        }
        let commits = provider.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].branch, "depbot/npm_and_yarn/left-pad-1.2.0");
        assert!(provider.created_pull_requests().is_empty());
        assert_eq!(summary.pull_requests_created(), 0);
    }
}

mod run_control {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_run_stops_before_next_dependency() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let provider = Arc::new(MemoryProvider::new("main"));
        let config = config(temp.path());

        let summary = RunController::new(
            &config,
            ecosystem(vec![left_pad()], factory.clone()),
            provider.clone(),
            HttpClient::new().unwrap(),
        )
        .with_cancellation(Arc::new(AtomicBool::new(true)))
        .run()
        .await
        .unwrap();

        assert!(summary.cancelled);
        assert!(summary.outcomes.is_empty());
        assert!(factory.checked().is_empty());
        assert_eq!(provider.write_count(), 0);
    }

    #[tokio::test]
    async fn test_write_through_updates_cached_files() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let mut config = config(temp.path());
        config.write = true;
        config.dry_run = true;

        run(
            &config,
            ecosystem(vec![left_pad()], factory),
            Arc::new(MemoryProvider::new("main")),
        )
        .await
        .unwrap();

        let cache = StagedCache::new(temp.path(), &config.source, PackageManager::NpmAndYarn, Vec::new());
        let manifest = std::fs::read_to_string(cache.root().join("package.json")).unwrap();
        assert!(manifest.contains("\"left-pad\": \"^1.3.0\""));
        let lockfile = std::fs::read_to_string(cache.root().join("package-lock.json")).unwrap();
        assert!(lockfile.contains("\"version\": \"1.3.0\""));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ecosystem = Arc::new(FakeEcosystem {
            fetcher: StaticFetcher {
                snapshot: snapshot(),
                fail: true,
            },
            dependencies: vec![left_pad()],
            factory: Arc::new(ScriptedFactory::default()),
        });

        let err = run(&config(temp.path()), ecosystem, Arc::new(MemoryProvider::new("main")))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Fetch(FetchError::FileNotFound { .. })));
        assert!(err.is_fatal());
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_no_functional_change_fails_only_that_dependency() {
        let temp = TempDir::new().unwrap();
        // The checker proposes the version already in the files
        let no_op = Script {
            updatable_at: vec![UnlockLevel::Own],
            updated: vec![bumped(&left_pad(), "1.0.0")],
            ..Script::default()
        };
        let factory = Arc::new(
            ScriptedFactory::default()
                .with("left-pad", no_op)
                .with("widget", updatable(&widget(), "1.1.0")),
        );
        let provider = Arc::new(MemoryProvider::new("main"));

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![left_pad(), widget()], factory),
            provider.clone(),
        )
        .await
        .unwrap();

        match summary.outcome_for("left-pad").unwrap() {
            DependencyOutcome::Failed {
                message, timeout, ..
            } => {
                assert!(message.contains("no functional change"));
                assert!(!timeout);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(summary.outcome_for("widget").unwrap().created_pull_request());
        assert_eq!(provider.commits().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_timeout_is_reported_as_timeout() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with(
            "left-pad",
            Script {
                timeout: true,
                ..Script::default()
            },
        ));

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![left_pad()], factory),
            Arc::new(MemoryProvider::new("main")),
        )
        .await
        .unwrap();

        assert!(matches!(
            summary.outcome_for("left-pad"),
            Some(DependencyOutcome::Failed { timeout: true, .. })
        ));
        assert_eq!(summary.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_rejection_keeps_the_pushed_commit() {
        let temp = TempDir::new().unwrap();
        let factory = Arc::new(ScriptedFactory::default().with("left-pad", updatable(&left_pad(), "1.3.0")));
        let provider = Arc::new(MemoryProvider::new("main").failing_pull_requests(409, "conflict"));

        let summary = run(
            &config(temp.path()),
            ecosystem(vec![left_pad()], factory),
            provider.clone(),
        )
        .await
        .unwrap();

        match summary.outcome_for("left-pad").unwrap() {
            DependencyOutcome::Failed { message, .. } => {
                assert!(message.contains("409"));
                assert!(message.contains("conflict"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(provider.commits().len(), 1);
        assert!(provider.created_pull_requests().is_empty());
    }
}
