// Module index: which module provides which executable
//
// Built once per process by walking the module repository (several minutes on
// a full tree), then shared read-only by every job. The walk can be skipped by
// persisting the executable table and reloading it on later runs.
//
// Ambiguity: two modules shipping an executable with the same basename both
// land in the entry list, but the executable map keeps whichever module was
// walked last. Callers that need epoch-aware resolution use `entries_for`.

mod table;
mod walker;

use crate::config::StatConfig;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// One executable found in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutableEntry {
    pub epoch: u16,
    pub module: String,
    pub version: String,
    pub executable: String,
}

/// Executable → module lookup plus the per-epoch list of installed modules
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    /// Fast lookup: executable basename → module name (last writer wins)
    executables: HashMap<String, String>,

    /// Every (epoch, module, version, executable) seen, in discovery order
    entries: Vec<ExecutableEntry>,

    /// Installed `module/version` strings per epoch
    available: BTreeMap<u16, Vec<String>>,
}

impl ModuleIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the whole repository: available modules and executables
    pub fn build(config: &StatConfig) -> Self {
        let mut index = Self::new();
        index.scan_available(config);
        index.walk_executables(config);
        index
    }

    /// List installed modules for every configured epoch
    pub fn scan_available(&mut self, config: &StatConfig) {
        for &epoch in &config.epochs {
            let modules = walker::list_available(&config.modules_root(epoch));
            info!(epoch, modules = modules.len(), "available modules listed");
            self.available.insert(epoch, modules);
        }
    }

    /// Walk `software/` of every configured epoch for executables
    pub fn walk_executables(&mut self, config: &StatConfig) {
        let before = self.entries.len();
        for &epoch in &config.epochs {
            for entry in walker::walk_epoch(config, epoch) {
                self.insert(entry);
            }
        }
        info!(
            executables = self.executables.len(),
            entries = self.entries.len() - before,
            "executable walk finished"
        );
    }

    /// Record one executable; a later entry overrides the map for its name
    pub fn insert(&mut self, entry: ExecutableEntry) {
        self.executables
            .insert(entry.executable.clone(), entry.module.clone());
        self.entries.push(entry);
    }

    /// Record an executable → module pair without epoch/version detail
    pub fn insert_pair(&mut self, executable: impl Into<String>, module: impl Into<String>) {
        self.executables.insert(executable.into(), module.into());
    }

    /// Replace the installed-module list of one epoch
    pub fn set_available(&mut self, epoch: u16, modules: Vec<String>) {
        self.available.insert(epoch, modules);
    }

    /// Module providing `executable`, if any
    pub fn resolve(&self, executable: &str) -> Option<&str> {
        self.executables.get(executable).map(String::as_str)
    }

    /// Every entry for `executable`, across modules and epochs
    pub fn entries_for<'a>(
        &'a self,
        executable: &'a str,
    ) -> impl Iterator<Item = &'a ExecutableEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.executable == executable)
    }

    /// The executable map
    pub fn executables(&self) -> &HashMap<String, String> {
        &self.executables
    }

    /// All entries in discovery order
    pub fn entries(&self) -> &[ExecutableEntry] {
        &self.entries
    }

    /// Installed `module/version` strings per epoch
    pub fn available(&self) -> &BTreeMap<u16, Vec<String>> {
        &self.available
    }

    /// Fully-qualified `epoch/module/version` strings, in epoch order
    pub fn qualified_modules(&self) -> impl Iterator<Item = String> + '_ {
        self.available.iter().flat_map(|(epoch, modules)| {
            modules
                .iter()
                .map(move |module| format!("{}/{}", epoch, module))
        })
    }

    /// Bare module names (version stripped), first occurrence order, deduplicated
    pub fn bare_modules(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut names = Vec::new();
        for module in self.available.values().flatten() {
            let bare = module.split('/').next().unwrap_or(module);
            if seen.insert(bare) {
                names.push(bare.to_string());
            }
        }
        names
    }

    /// Number of distinct executable names
    pub fn len(&self) -> usize {
        self.executables.len()
    }

    /// True when no executable is known
    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }
}
