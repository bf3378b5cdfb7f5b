//! Module usage counters
//!
//! Two counters are kept: one per bare module name (`Python`) and one per
//! fully-qualified module (`2016/Python/3.6.1`). Both are pre-seeded to zero
//! from the module index so that "never used" differs from "not a module".

use crate::module_index::ModuleIndex;
use crate::script::ScriptAnalysis;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Insertion-ordered name → count map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedCounter {
    counts: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl OrderedCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` with count 0 unless already present
    pub fn seed(&mut self, name: &str) {
        if !self.positions.contains_key(name) {
            self.positions.insert(name.to_string(), self.counts.len());
            self.counts.push((name.to_string(), 0));
        }
    }

    /// Add `by` to an existing key; returns false when the key is unknown
    pub fn bump(&mut self, name: &str, by: u64) -> bool {
        match self.positions.get(name) {
            Some(&pos) => {
                self.counts[pos].1 += by;
                true
            }
            None => false,
        }
    }

    /// Add `by` to `name`, inserting it at the end when unknown
    pub fn bump_or_insert(&mut self, name: &str, by: u64) {
        if !self.bump(name, by) {
            self.positions.insert(name.to_string(), self.counts.len());
            self.counts.push((name.to_string(), by));
        }
    }

    /// Count for `name`, if it is a key
    pub fn get(&self, name: &str) -> Option<u64> {
        self.positions.get(name).map(|&pos| self.counts[pos].1)
    }

    /// Whether `name` is a key
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// `(name, count)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when there are no keys
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

/// Running module usage across a corpus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageCounters {
    modules: OrderedCounter,
    versions: OrderedCounter,
}

/// Serializable snapshot of the counters
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub modules: Vec<(String, u64)>,
    pub versions: Vec<(String, u64)>,
}

impl UsageCounters {
    /// Create empty, unseeded counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters seeded with every module known to the index
    pub fn seeded(index: &ModuleIndex) -> Self {
        let mut counters = Self::new();
        for module in index.bare_modules() {
            counters.modules.seed(&module);
        }
        for qualified in index.qualified_modules() {
            counters.versions.seed(&qualified);
        }
        debug!(
            modules = counters.modules.len(),
            versions = counters.versions.len(),
            "usage counters seeded"
        );
        counters
    }

    /// Count one use of a module or of an executable
    ///
    /// `name` is taken as a module when the counter knows it, otherwise it is
    /// resolved through the executable map. Returns the module counted, or
    /// `None` when `name` resolves to nothing (the call is then a no-op).
    pub fn increment<'a>(&mut self, name: &'a str, index: &'a ModuleIndex) -> Option<&'a str> {
        if self.modules.bump(name, 1) {
            return Some(name);
        }
        match index.resolve(name) {
            Some(module) => {
                self.modules.bump_or_insert(module, 1);
                Some(module)
            }
            None => {
                debug!(token = name, "unresolved token");
                None
            }
        }
    }

    /// Count one use of `epoch/module/version` (or `epoch/module`)
    ///
    /// Only seeded keys are counted; returns whether the key was known.
    pub fn increment_version(&mut self, epoch: u16, module: &str, version: Option<&str>) -> bool {
        let key = match version {
            Some(version) => format!("{}/{}/{}", epoch, module, version),
            None => format!("{}/{}", epoch, module),
        };
        let known = self.versions.bump(&key, 1);
        if !known {
            debug!(key = %key, "unknown module version");
        }
        known
    }

    /// Count every module a script uses
    ///
    /// Every key of `used()` goes through [`increment`](Self::increment);
    /// explicit module loads also count against their toolchain version.
    /// Returns how many names resolved to a module.
    pub fn record(&mut self, script: &ScriptAnalysis, index: &ModuleIndex) -> usize {
        let mut resolved = 0;
        for name in script.used().keys() {
            if self.increment(name, index).is_some() {
                resolved += 1;
            }
        }
        for (module, version) in script.loaded() {
            self.increment_version(script.toolchain(), module, version.as_deref());
        }
        resolved
    }

    /// Add another set of counters into this one
    pub fn merge(&mut self, other: &UsageCounters) {
        for (name, count) in other.modules.iter() {
            self.modules.seed(name);
            self.modules.bump(name, count);
        }
        for (name, count) in other.versions.iter() {
            self.versions.seed(name);
            self.versions.bump(name, count);
        }
    }

    /// Count of a bare module
    pub fn module_count(&self, module: &str) -> Option<u64> {
        self.modules.get(module)
    }

    /// Count of an `epoch/module/version` key
    pub fn version_count(&self, key: &str) -> Option<u64> {
        self.versions.get(key)
    }

    /// Bare module counter
    pub fn modules(&self) -> &OrderedCounter {
        &self.modules
    }

    /// Fully-qualified module counter
    pub fn versions(&self) -> &OrderedCounter {
        &self.versions
    }

    /// Owned copy of both counters, in insertion order
    pub fn snapshot(&self) -> UsageSnapshot {
        let own = |counter: &OrderedCounter| -> Vec<(String, u64)> {
            counter
                .iter()
                .map(|(name, count)| (name.to_string(), count))
                .collect()
        };
        UsageSnapshot {
            modules: own(&self.modules),
            versions: own(&self.versions),
        }
    }
}
