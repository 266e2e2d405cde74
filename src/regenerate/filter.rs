//! Selecting the files an update set requires regenerating

use crate::domain::{Dependency, DependencyFile, FileSnapshot, PackageManager};

/// Returns the files that must be regenerated for `dependencies`, in snapshot order
///
/// With any top-level dependency: manifests declaring an updated dependency plus
/// every lock file. With only transitive dependencies: lock files alone.
pub fn files_requiring_update(
    snapshot: &FileSnapshot,
    dependencies: &[Dependency],
    package_manager: PackageManager,
) -> Vec<DependencyFile> {
    if dependencies.iter().any(|d| d.top_level) {
        top_level_files(snapshot, dependencies, package_manager)
    } else {
        sub_dependency_files(snapshot, dependencies, package_manager)
    }
}

fn top_level_files(
    snapshot: &FileSnapshot,
    dependencies: &[Dependency],
    package_manager: PackageManager,
) -> Vec<DependencyFile> {
    snapshot
        .files()
        .iter()
        .filter(|file| !file.is_support_file())
        .filter(|file| {
            package_manager.is_lockfile(&file.name)
                || (package_manager.is_manifest(&file.name)
                    && dependencies.iter().any(|dep| declares(dep, &file.name)))
        })
        .cloned()
        .collect()
}

fn sub_dependency_files(
    snapshot: &FileSnapshot,
    dependencies: &[Dependency],
    package_manager: PackageManager,
) -> Vec<DependencyFile> {
    let lockfiles: Vec<&DependencyFile> = snapshot
        .files()
        .iter()
        .filter(|file| !file.is_support_file() && package_manager.is_lockfile(&file.name))
        .collect();

    let mentioning: Vec<DependencyFile> = lockfiles
        .iter()
        .filter(|file| dependencies.iter().any(|dep| mentions(&file.content, &dep.name)))
        .map(|file| (*file).clone())
        .collect();

    if mentioning.is_empty() {
        lockfiles.into_iter().cloned().collect()
    } else {
        mentioning
    }
}

/// True if the dependency has (or had) a requirement in `file_name`
fn declares(dependency: &Dependency, file_name: &str) -> bool {
    let current = dependency.requirements.iter().any(|r| r.file == file_name);
    let previous = dependency
        .previous_requirements
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| r.file == file_name);
    current || previous
}

/// Lock file formats quote names (json), prefix versions with `@` (yarn) or use `/name/` paths (pnpm)
fn mentions(content: &str, name: &str) -> bool {
    content.contains(&format!("\"{}\"", name))
        || content.contains(&format!("{}@", name))
        || content.contains(&format!("/{}/", name))
        || content.contains(&format!("/{}@", name))
}
