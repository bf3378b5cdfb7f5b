use crate::config::StatConfig;
use crate::module_index::ExecutableEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Sorted `(name, path)` pairs of a directory; unreadable directories are empty
fn sorted_listing(dir: &Path) -> Vec<(String, PathBuf)> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot list directory");
            return Vec::new();
        }
    };
    let mut listing: Vec<(String, PathBuf)> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    listing.sort();
    listing
}

/// `module/version` strings under `modules/all`, or the bare module name
/// when a module directory holds no version files
pub(super) fn list_available(modules_root: &Path) -> Vec<String> {
    if !modules_root.is_dir() {
        warn!(dir = %modules_root.display(), "module listing root missing");
        return Vec::new();
    }

    let mut available = Vec::new();
    for (module, path) in sorted_listing(modules_root) {
        if !path.is_dir() {
            continue;
        }
        let versions: Vec<String> = sorted_listing(&path)
            .into_iter()
            .filter(|(name, path)| !name.contains('~') && !path.is_dir())
            .map(|(name, _)| name)
            .collect();
        if versions.is_empty() {
            available.push(module);
        } else {
            available.extend(versions.into_iter().map(|v| format!("{}/{}", module, v)));
        }
    }
    available
}

/// Every executable of one epoch's `software/` tree, in walk order
pub(super) fn walk_epoch(config: &StatConfig, epoch: u16) -> Vec<ExecutableEntry> {
    let root = config.software_root(epoch);
    if !root.is_dir() {
        warn!(epoch, dir = %root.display(), "software root missing, epoch skipped");
        return Vec::new();
    }

    let modules: Vec<(String, PathBuf)> = sorted_listing(&root)
        .into_iter()
        .filter(|(name, path)| path.is_dir() && !config.excluded_modules.contains(name))
        .collect();
    if modules.is_empty() {
        warn!(epoch, dir = %root.display(), "no modules found");
    }

    let mut entries = Vec::new();
    for (module, module_path) in modules {
        if has_whitespace(&module) {
            warn!(module = %module, "module name contains whitespace, skipped");
            continue;
        }
        for (version, version_path) in sorted_listing(&module_path) {
            if !version_path.is_dir() || has_whitespace(&version) {
                continue;
            }
            for bin_dir in bin_dirs(&version_path, &config.bin_dirs) {
                for executable in executables_in(&bin_dir, &config.blocked_extensions) {
                    entries.push(ExecutableEntry {
                        epoch,
                        module: module.clone(),
                        version: version.clone(),
                        executable,
                    });
                }
            }
        }
    }
    entries
}

/// Executable directories of one version: directly under it when present,
/// otherwise anywhere below it
fn bin_dirs(version_path: &Path, names: &[String]) -> Vec<PathBuf> {
    let direct: Vec<PathBuf> = names
        .iter()
        .map(|name| version_path.join(name))
        .filter(|path| path.is_dir())
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    let nested: Vec<PathBuf> = WalkDir::new(version_path)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            names.iter().any(|n| *n == name)
        })
        .map(|entry| entry.into_path())
        .collect();
    if !nested.is_empty() {
        debug!(version = %version_path.display(), dirs = nested.len(), "nested bin directories");
    }
    nested
}

fn executables_in(bin_dir: &Path, blocked: &[String]) -> Vec<String> {
    sorted_listing(bin_dir)
        .into_iter()
        .filter(|(_, path)| !path.is_dir())
        .map(|(name, _)| name)
        .filter(|name| !has_whitespace(name) && !is_blocked(name, blocked))
        .collect()
}

/// A name is blocked when any suffix after its first `.` is on the list
pub(super) fn is_blocked(name: &str, blocked: &[String]) -> bool {
    name.split('.')
        .skip(1)
        .any(|suffix| blocked.iter().any(|b| b == suffix))
}

fn has_whitespace(name: &str) -> bool {
    name.chars().any(char::is_whitespace)
}
