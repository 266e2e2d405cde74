//! Native lock file regeneration
//!
//! Files are materialised in a temp dir and the package manager rewrites the
//! lock file there:
//! - npm:  `npm install --package-lock-only --ignore-scripts`
//! - yarn: `yarn install --ignore-scripts --frozen-lockfile=false`
//! - pnpm: `npx pnpm install --lockfile-only --recursive`
//! - rush: `node common/scripts/install-run-rush.js update --no-link --bypass-policy`
//!
//! When no requirement text changed, a plain install would keep the locked
//! versions, so the named packages are updated instead:
//! - npm:  `npm install <name>@<version>` for top-level packages and
//!   `npm update <name>` for transitive ones
//! - yarn: `yarn upgrade <name>@<version>`
//! - pnpm: `npx pnpm update <name>@<version>`
//!
//! npm and yarn save the pinned versions into package.json, so the original
//! manifests are written back and a plain install re-syncs the lock file.
//! A failing tool yields `None`; exceeding the timeout is an error.

use crate::domain::{Dependency, DependencyFile, FileType};
use crate::error::UpdaterError;
use crate::regenerate::LockfileGenerator;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lock file tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTool {
    Npm,
    Yarn,
    Pnpm,
    Rush,
}

impl LockTool {
    pub fn name(&self) -> &'static str {
        match self {
            LockTool::Npm => "npm",
            LockTool::Yarn => "yarn",
            LockTool::Pnpm => "pnpm",
            LockTool::Rush => "rush",
        }
    }

    /// Lock file names this tool writes
    pub fn lockfile_names(&self) -> &'static [&'static str] {
        match self {
            LockTool::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            LockTool::Yarn => &["yarn.lock"],
            LockTool::Pnpm | LockTool::Rush => &["pnpm-lock.yaml"],
        }
    }

    /// Builds the steps for regenerating against `dependencies`
    pub fn steps(&self, dependencies: &[Dependency]) -> Vec<LockStep> {
        let targeted = !dependencies.iter().any(|d| d.requirements_changed());
        if !targeted || *self == LockTool::Rush {
            return vec![LockStep::Run(self.install_command())];
        }

        let pinned = |deps: &[&Dependency]| {
            deps.iter()
                .filter_map(|d| d.version.as_ref().map(|v| format!("{}@{}", d.name, v)))
                .collect::<Vec<_>>()
        };
        let (top_level, transitive): (Vec<&Dependency>, Vec<&Dependency>) =
            dependencies.iter().partition(|d| d.top_level);

        match self {
            LockTool::Npm => {
                let mut steps = Vec::new();
                let targets = pinned(&top_level[..]);
                if !targets.is_empty() {
                    steps.push(LockStep::Run(
                        [strings(&["npm", "install"]), targets, strings(&["--package-lock-only", "--ignore-scripts"])]
                            .concat(),
                    ));
                    steps.push(LockStep::RestoreManifests);
                    steps.push(LockStep::Run(self.install_command()));
                }
                if !transitive.is_empty() {
                    steps.push(LockStep::Run(
                        [
                            strings(&["npm", "update"]),
                            transitive.iter().map(|d| d.name.clone()).collect(),
                            strings(&["--package-lock-only", "--ignore-scripts"]),
                        ]
                        .concat(),
                    ));
                }
                steps
            }
            LockTool::Yarn => {
                let all: Vec<&Dependency> = dependencies.iter().collect();
                vec![
                    LockStep::Run([strings(&["yarn", "upgrade"]), pinned(&all[..]), strings(&["--ignore-scripts"])].concat()),
                    LockStep::RestoreManifests,
                    LockStep::Run(self.install_command()),
                ]
            }
            LockTool::Pnpm => {
                let all: Vec<&Dependency> = dependencies.iter().collect();
                vec![LockStep::Run(
                    [strings(&["npx", "pnpm", "update"]), pinned(&all[..]), strings(&["--lockfile-only", "--recursive"])]
                        .concat(),
                )]
            }
            LockTool::Rush => vec![LockStep::Run(self.install_command())],
        }
    }

    /// Full install that rewrites the lock file from the manifests
    fn install_command(&self) -> Vec<String> {
        match self {
            LockTool::Npm => strings(&["npm", "install", "--package-lock-only", "--ignore-scripts"]),
            LockTool::Yarn => strings(&["yarn", "install", "--ignore-scripts", "--frozen-lockfile=false"]),
            LockTool::Pnpm => strings(&["npx", "pnpm", "install", "--lockfile-only", "--recursive"]),
            LockTool::Rush => strings(&[
                "node",
                "common/scripts/install-run-rush.js",
                "update",
                "--no-link",
                "--bypass-policy",
            ]),
        }
    }
}

/// One step of a lock file regeneration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStep {
    /// Runs a command in the working directory
    Run(Vec<String>),
    /// Writes the manifests back with their pre-run content
    RestoreManifests,
}

impl LockStep {
    pub fn command_line(&self) -> Option<String> {
        match self {
            LockStep::Run(args) => Some(args.join(" ")),
            LockStep::RestoreManifests => None,
        }
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Regenerates one lock file format by running its native tool
pub struct NativeLockfileGenerator {
    tool: LockTool,
    timeout: Duration,
}

impl NativeLockfileGenerator {
    pub fn new(tool: LockTool, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    async fn run(&self, args: &[String], working_dir: &Path) -> Result<Option<Output>, UpdaterError> {
        let Some((program, rest)) = args.split_first() else {
            return Ok(None);
        };

        let mut command = Command::new(program);
        command.args(rest).current_dir(working_dir).kill_on_drop(true);

        debug!(tool = self.tool.name(), command = %args.join(" "), dir = %working_dir.display(), "running");
        match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => Err(UpdaterError::ToolTimeout {
                tool: self.tool.name().to_string(),
                seconds: self.timeout.as_secs(),
            }),
            Ok(Err(e)) => {
                warn!(tool = self.tool.name(), error = %e, "failed to execute command");
                Ok(None)
            }
            Ok(Ok(output)) => Ok(Some(output)),
        }
    }

    /// Runs every step in order; returns false as soon as one fails
    async fn run_steps(
        &self,
        steps: &[LockStep],
        root: &Path,
        working_dir: &Path,
        files: &[DependencyFile],
    ) -> Result<bool, UpdaterError> {
        for step in steps {
            let args = match step {
                LockStep::Run(args) => args,
                LockStep::RestoreManifests => {
                    let manifests: Vec<DependencyFile> = files
                        .iter()
                        .filter(|f| f.file_type == FileType::Manifest)
                        .cloned()
                        .collect();
                    write_files(root, &manifests).map_err(|e| UpdaterError::tool(self.tool.name(), e.to_string()))?;
                    debug!(tool = self.tool.name(), count = manifests.len(), "restored manifests");
                    continue;
                }
            };

            let Some(output) = self.run(args, working_dir).await? else {
                return Ok(false);
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    tool = self.tool.name(),
                    command = %args.join(" "),
                    status = %output.status,
                    stderr = %stderr.trim(),
                    "lock file regeneration failed"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl LockfileGenerator for NativeLockfileGenerator {
    fn name(&self) -> &'static str {
        self.tool.name()
    }

    fn handles(&self, file_name: &str) -> bool {
        self.tool.lockfile_names().contains(&file_name)
    }

    async fn regenerate(
        &self,
        lockfile: &DependencyFile,
        files: &[DependencyFile],
        dependencies: &[Dependency],
    ) -> Result<Option<String>, UpdaterError> {
        let temp_dir = TempDir::new().map_err(|e| UpdaterError::tool(self.tool.name(), e.to_string()))?;
        write_files(temp_dir.path(), files).map_err(|e| UpdaterError::tool(self.tool.name(), e.to_string()))?;

        // Rush runs at the repository root; the others next to their lock file
        let working_dir = match self.tool {
            LockTool::Rush => temp_dir.path().to_path_buf(),
            _ => parent_dir(temp_dir.path(), &lockfile.name),
        };

        let steps = self.tool.steps(dependencies);
        if !self.run_steps(&steps, temp_dir.path(), &working_dir, files).await? {
            return Ok(None);
        }

        match std::fs::read_to_string(temp_dir.path().join(&lockfile.name)) {
            Ok(content) => {
                info!(tool = self.tool.name(), file = %lockfile.name, "regenerated lock file");
                Ok(Some(content))
            }
            Err(e) => {
                warn!(tool = self.tool.name(), file = %lockfile.name, error = %e, "lock file missing after run");
                Ok(None)
            }
        }
    }
}

/// Writes every file (support files included) under `root`
fn write_files(root: &Path, files: &[DependencyFile]) -> std::io::Result<()> {
    for file in files {
        let path = root.join(&file.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &file.content)?;
    }
    Ok(())
}

fn parent_dir(root: &Path, file_name: &str) -> PathBuf {
    root.join(file_name)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf())
}
