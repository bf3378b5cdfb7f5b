//! Job script analysis
//!
//! Two independent scans over the non-comment lines of a job script:
//! - toolchain detection (`source switch_to_2015a`, `module use /apps/leuven/...`)
//! - module loads, and when a line is not a module load, a heuristic harvest
//!   of tokens that probably name executables
//!
//! The candidate harvest is deliberately over-inclusive. Tokens that name no
//! known executable are dropped later by the usage aggregator.

use crate::error::{Result, StatError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{trace, warn};

/// Toolchain assumed when a script never switches
pub const BASELINE_EPOCH: u16 = 2014;

const SWITCH_PHRASE: &str = "source switch_to_201";
const MODULE_USE_PHRASE: &str = "module use /apps/leuven/";
const MODULE_LOAD: &str = "module load";

/// Offset of the year in `source switch_to_2015a`
const SWITCH_YEAR_OFFSET: usize = 17;

/// First characters of tokens that are never executables
const NOISE_PREFIXES: &[char] = &['-', '$', ';', '*', '"'];

/// What a job script loads and calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptAnalysis {
    toolchain: u16,
    loaded: BTreeMap<String, Option<String>>,
    called: BTreeSet<String>,
}

impl ScriptAnalysis {
    /// Analyze a script file, assuming [`BASELINE_EPOCH`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_baseline(path, BASELINE_EPOCH)
    }

    /// Analyze a script file with an explicit baseline toolchain
    pub fn from_file_with_baseline<P: AsRef<Path>>(path: P, baseline: u16) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StatError::not_found(path));
        }
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(Self::from_lines_with_baseline(text.lines(), baseline))
    }

    /// Analyze script text, assuming [`BASELINE_EPOCH`]
    ///
    /// # Example
    /// ```
    /// use modstat::script::ScriptAnalysis;
    ///
    /// let script = ScriptAnalysis::from_lines([
    ///     "#PBS -l walltime=1:00:00",
    ///     "source switch_to_2015a",
    ///     "module load Python/3.6.1",
    ///     "python run.py input.dat",
    /// ]);
    /// assert_eq!(script.toolchain(), 2015);
    /// assert_eq!(script.loaded()["Python"].as_deref(), Some("3.6.1"));
    /// assert!(script.called().contains("run.py"));
    /// ```
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_lines_with_baseline(lines, BASELINE_EPOCH)
    }

    /// Analyze script text with an explicit baseline toolchain
    pub fn from_lines_with_baseline<I, S>(lines: I, baseline: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<S> = lines
            .into_iter()
            .filter(|line| !line.as_ref().trim_start().starts_with('#'))
            .collect();

        let mut analysis = Self {
            toolchain: baseline,
            loaded: BTreeMap::new(),
            called: BTreeSet::new(),
        };

        for line in &lines {
            let line = line.as_ref();
            if line.contains(SWITCH_PHRASE) || line.contains(MODULE_USE_PHRASE) {
                analysis.set_toolchain(line);
            }
        }

        for line in &lines {
            let line = line.as_ref();
            if line.trim().starts_with(MODULE_LOAD) {
                analysis.add_module(line);
            } else {
                analysis.add_candidates(line);
            }
        }

        analysis
    }

    /// Toolchain epoch in effect (last switch wins)
    pub fn toolchain(&self) -> u16 {
        self.toolchain
    }

    /// Explicitly loaded modules: name → version, when one was given
    pub fn loaded(&self) -> &BTreeMap<String, Option<String>> {
        &self.loaded
    }

    /// Tokens that may name executables
    pub fn called(&self) -> &BTreeSet<String> {
        &self.called
    }

    /// Loaded modules merged over called candidates
    ///
    /// A name present in both keeps the version recorded by the module load.
    pub fn used(&self) -> BTreeMap<String, Option<String>> {
        let mut used: BTreeMap<String, Option<String>> =
            self.called.iter().map(|token| (token.clone(), None)).collect();
        used.extend(self.loaded.iter().map(|(k, v)| (k.clone(), v.clone())));
        used
    }

    /// Whether the script loads at least one module explicitly
    pub fn has_module_load(&self) -> bool {
        !self.loaded.is_empty()
    }

    fn set_toolchain(&mut self, line: &str) {
        let line = line.trim();
        let year = if line.contains(SWITCH_PHRASE) {
            line.get(SWITCH_YEAR_OFFSET..SWITCH_YEAR_OFFSET + 4)
                .map(str::to_string)
        } else if line.contains(MODULE_USE_PHRASE) {
            line.split('/').nth(4).map(|segment| {
                let mut segment = segment.trim_end().to_string();
                segment.pop();
                segment
            })
        } else {
            warn!(line, "not a toolchain switch");
            return;
        };

        match year.as_deref().map(str::parse::<u16>) {
            Some(Ok(year)) => {
                trace!(year, "toolchain switch");
                self.toolchain = year;
            }
            _ => warn!(line, "unparsable toolchain year"),
        }
    }

    fn add_module(&mut self, line: &str) {
        let spec = line
            .trim()
            .strip_prefix(MODULE_LOAD)
            .unwrap_or_default()
            .trim();
        if spec.is_empty() {
            return;
        }
        let mut pieces = spec.splitn(2, '/');
        let name = pieces.next().unwrap_or_default().to_string();
        let version = pieces.next().map(str::to_string);
        self.loaded.insert(name, version);
    }

    fn add_candidates(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return;
        }

        let mut in_quote = false;
        for token in tokens {
            if in_quote {
                in_quote = !closes_quote(token);
                continue;
            }
            if token.starts_with('"') {
                in_quote = !closes_quote(&token[1..]);
                continue;
            }
            if token.starts_with(NOISE_PREFIXES) || token.contains('=') {
                continue;
            }
            self.called.insert(token.to_string());
        }
    }
}

fn closes_quote(token: &str) -> bool {
    token.matches('"').count() % 2 == 1
}
