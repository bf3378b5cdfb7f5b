//! Corpus scanner: run every job script of a directory tree through the
//! analyzer and fold the results into usage counters
//!
//! Per-job failures never abort a scan. They are classified as a
//! [`SkipReason`] and tallied in the [`ScanSummary`].

use crate::config::StatConfig;
use crate::error::{Result, StatError};
use crate::module_index::ModuleIndex;
use crate::record::ScriptRecord;
use crate::script::ScriptAnalysis;
use crate::usage::UsageCounters;
use crossbeam::queue::ArrayQueue;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Why a job contributed nothing to the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Script or companion record missing
    NotFound,
    /// Node spec with more than three fields
    MalformedSpec,
    /// Record present but not parseable
    BadRecord,
    /// Script present but not readable
    Unreadable,
    /// Analyzed, but no module loaded and no candidate found
    NoUse,
}

impl SkipReason {
    /// Classify a per-job error; `None` for errors that abort the whole scan
    fn from_error(err: &StatError) -> Option<Self> {
        match err {
            StatError::NotFound { .. } => Some(SkipReason::NotFound),
            StatError::MalformedSpec { .. } => Some(SkipReason::MalformedSpec),
            StatError::Record { .. } => Some(SkipReason::BadRecord),
            StatError::Io(_) => Some(SkipReason::Unreadable),
            StatError::InvalidArgument(_)
            | StatError::Serialize(_)
            | StatError::WorkerPanicked => None,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::NotFound => "not found",
            SkipReason::MalformedSpec => "malformed node spec",
            SkipReason::BadRecord => "bad record",
            SkipReason::Unreadable => "unreadable script",
            SkipReason::NoUse => "no module use",
        };
        write!(f, "{}", label)
    }
}

/// Tallies of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Scripts visited
    pub total: usize,
    /// Scripts whose modules were counted
    pub analyzed: usize,
    /// Skipped scripts per reason
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Opened scripts with at least one `module load`
    pub with_module_load: usize,
    /// Opened scripts without any `module load`
    pub without_module_load: usize,
}

impl ScanSummary {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    /// Skips for one reason
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    /// Skips for every reason
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Percentage of visited scripts that were analyzed
    pub fn percent_analyzed(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.analyzed as f64 / self.total as f64 * 100.0
    }

    /// One-line human summary
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "All: {}; OK: {}; Skipped: {} => percent OK: {:.2}%",
            self.total,
            self.analyzed,
            self.total_skipped(),
            self.percent_analyzed()
        );
        for (reason, count) in &self.skipped {
            out.push_str(&format!("\n  {}: {}", reason, count));
        }
        out.push_str(&format!(
            "\n  with module load: {}; without: {}",
            self.with_module_load, self.without_module_load
        ));
        out
    }
}

/// An ordered list of job scripts plus the conventions to open them
#[derive(Debug, Clone)]
pub struct Corpus {
    scripts: Vec<PathBuf>,
    script_extension: String,
    record_extension: String,
    baseline_epoch: u16,
}

impl Corpus {
    /// Every `*.<script_extension>` file under `dir`, sorted by path
    pub fn discover<P: AsRef<Path>>(dir: P, config: &StatConfig) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(StatError::not_found(dir));
        }

        let mut scripts: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable corpus entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == config.script_extension.as_str())
            })
            .map(|entry| entry.into_path())
            .collect();
        scripts.sort();

        info!(dir = %dir.display(), scripts = scripts.len(), "corpus discovered");
        Ok(Self::from_paths(scripts, config))
    }

    /// Corpus over an explicit list of scripts
    pub fn from_paths(scripts: Vec<PathBuf>, config: &StatConfig) -> Self {
        Self {
            scripts,
            script_extension: config.script_extension.clone(),
            record_extension: config.record_extension.clone(),
            baseline_epoch: config.baseline_epoch,
        }
    }

    /// Reorder scripts reproducibly
    pub fn shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.scripts.shuffle(&mut rng);
        self
    }

    /// Keep only the first `n` scripts
    pub fn limit(mut self, n: usize) -> Self {
        self.scripts.truncate(n);
        self
    }

    /// Scripts in scan order
    pub fn scripts(&self) -> &[PathBuf] {
        &self.scripts
    }

    /// Number of scripts
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// True when no script was found
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Scan every script in order into `counters`
    pub fn scan(&self, index: &ModuleIndex, counters: &mut UsageCounters) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        for path in &self.scripts {
            let outcome = self.open_job(path)?;
            tally(outcome, index, counters, &mut summary);
        }
        info!(
            total = summary.total,
            analyzed = summary.analyzed,
            skipped = summary.total_skipped(),
            "corpus scan finished"
        );
        Ok(summary)
    }

    /// Scan with `workers` threads sharing the frozen index
    ///
    /// Workers only open and analyze jobs, pulling scripts from a shared work
    /// queue. Outcomes are then counted in corpus order, so counters and
    /// tie order match a serial [`scan`](Self::scan) exactly.
    pub fn scan_parallel(
        &self,
        index: &ModuleIndex,
        counters: &mut UsageCounters,
        workers: usize,
    ) -> Result<ScanSummary> {
        if workers == 0 {
            return Err(StatError::InvalidArgument(
                "worker count must be a positive integer".to_string(),
            ));
        }
        if workers == 1 || self.scripts.len() < 2 {
            return self.scan(index, counters);
        }

        let queue = ArrayQueue::new(self.scripts.len());
        for job in self.scripts.iter().map(PathBuf::as_path).enumerate() {
            // capacity equals the script count
            let _ = queue.push(job);
        }

        let shards: Vec<Result<Vec<(usize, JobOutcome)>>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let queue = &queue;
                    scope.spawn(move || -> Result<Vec<(usize, JobOutcome)>> {
                        let mut outcomes = Vec::new();
                        while let Some((position, path)) = queue.pop() {
                            outcomes.push((position, self.open_job(path)?));
                        }
                        debug!(worker, scripts = outcomes.len(), "worker finished");
                        Ok(outcomes)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(StatError::WorkerPanicked)))
                .collect()
        });

        let mut outcomes = Vec::with_capacity(self.scripts.len());
        for shard in shards {
            outcomes.extend(shard?);
        }
        outcomes.sort_unstable_by_key(|(position, _)| *position);

        let mut summary = ScanSummary::default();
        for (_, outcome) in outcomes {
            tally(outcome, index, counters, &mut summary);
        }

        info!(
            workers,
            total = summary.total,
            analyzed = summary.analyzed,
            skipped = summary.total_skipped(),
            "parallel corpus scan finished"
        );
        Ok(summary)
    }

    fn open_job(&self, path: &Path) -> Result<JobOutcome> {
        match ScriptRecord::open_with(
            path,
            &self.script_extension,
            &self.record_extension,
            self.baseline_epoch,
        ) {
            Ok(record) => Ok(JobOutcome::Opened(record.analysis)),
            Err(err) => match SkipReason::from_error(&err) {
                Some(reason) => {
                    debug!(script = %path.display(), error = %err, "job skipped");
                    Ok(JobOutcome::Skipped(reason))
                }
                None => Err(err),
            },
        }
    }
}

/// One job after opening, before anything is counted
enum JobOutcome {
    Opened(ScriptAnalysis),
    Skipped(SkipReason),
}

fn tally(
    outcome: JobOutcome,
    index: &ModuleIndex,
    counters: &mut UsageCounters,
    summary: &mut ScanSummary,
) {
    summary.total += 1;
    let analysis = match outcome {
        JobOutcome::Opened(analysis) => analysis,
        JobOutcome::Skipped(reason) => {
            summary.skip(reason);
            return;
        }
    };

    if analysis.has_module_load() {
        summary.with_module_load += 1;
    } else {
        summary.without_module_load += 1;
    }

    if analysis.used().is_empty() {
        summary.skip(SkipReason::NoUse);
        return;
    }

    counters.record(&analysis, index);
    summary.analyzed += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::top;
    use std::fs;
    use tempfile::TempDir;

    const RECORD: &str = "<Job><queue>q1h</queue><nodes>1:ppn=20:haswell</nodes></Job>";

    fn job(dir: &Path, id: &str, record: Option<&str>, script: &str) {
        fs::write(dir.join(format!("{}.SC", id)), script).unwrap();
        if let Some(record) = record {
            fs::write(dir.join(format!("{}.JB", id)), record).unwrap();
        }
    }

    fn index() -> ModuleIndex {
        let mut index = ModuleIndex::new();
        index.set_available(2016, vec!["GROMACS/5.1.2".to_string(), "R".to_string()]);
        index.insert_pair("gmx", "GROMACS");
        index.insert_pair("Rscript", "R");
        index
    }

    fn corpus_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2017/10")).unwrap();
        job(
            root,
            "1",
            Some(RECORD),
            "source switch_to_2016a\nmodule load GROMACS/5.1.2\ngmx mdrun -deffnm md\n",
        );
        job(&root.join("2017/10"), "2", Some(RECORD), "Rscript analysis.R\n");
        job(root, "3", None, "Rscript analysis.R\n");
        job(root, "4", Some("<Job><nodes>1:2:3:4</nodes></Job>"), "Rscript x.R\n");
        job(root, "5", Some("<Job><queue>q1h</Job>"), "Rscript x.R\n");
        job(root, "6", Some(RECORD), "cd\n");
        fs::write(root.join("notes.txt"), "not a job").unwrap();
        dir
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = corpus_dir();
        let corpus = Corpus::discover(dir.path(), &StatConfig::default()).unwrap();
        assert_eq!(corpus.len(), 6);
        let mut sorted = corpus.scripts().to_vec();
        sorted.sort();
        assert_eq!(corpus.scripts(), sorted.as_slice());
        assert!(corpus.scripts().iter().all(|p| p.extension().unwrap() == "SC"));
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = Corpus::discover("/nonexistent/jobscripts", &StatConfig::default()).unwrap_err();
        assert!(matches!(err, StatError::NotFound { .. }));
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let dir = corpus_dir();
        let config = StatConfig::default();
        let a = Corpus::discover(dir.path(), &config).unwrap().shuffle(7);
        let b = Corpus::discover(dir.path(), &config).unwrap().shuffle(7);
        assert_eq!(a.scripts(), b.scripts());
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn test_limit() {
        let dir = corpus_dir();
        let corpus = Corpus::discover(dir.path(), &StatConfig::default())
            .unwrap()
            .limit(2);
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn test_scan_tallies() {
        let dir = corpus_dir();
        let index = index();
        let mut counters = UsageCounters::seeded(&index);
        let corpus = Corpus::discover(dir.path(), &StatConfig::default()).unwrap();
        let summary = corpus.scan(&index, &mut counters).unwrap();

        assert_eq!(summary.total, 6);
        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.skipped_for(SkipReason::NotFound), 1);
        assert_eq!(summary.skipped_for(SkipReason::MalformedSpec), 1);
        assert_eq!(summary.skipped_for(SkipReason::BadRecord), 1);
        assert_eq!(summary.skipped_for(SkipReason::NoUse), 1);
        assert_eq!(summary.with_module_load, 1);
        assert_eq!(summary.without_module_load, 2);

        // the GROMACS load and the gmx call are counted separately
        assert_eq!(counters.module_count("GROMACS"), Some(2));
        assert_eq!(counters.module_count("R"), Some(1));
        assert_eq!(counters.version_count("2016/GROMACS/5.1.2"), Some(1));
    }

    #[test]
    fn test_scan_parallel_matches_serial() {
        let dir = corpus_dir();
        let index = index();
        let corpus = Corpus::discover(dir.path(), &StatConfig::default()).unwrap();

        let mut serial = UsageCounters::seeded(&index);
        let serial_summary = corpus.scan(&index, &mut serial).unwrap();

        let mut parallel = UsageCounters::seeded(&index);
        let parallel_summary = corpus.scan_parallel(&index, &mut parallel, 3).unwrap();

        assert_eq!(serial_summary, parallel_summary);
        assert_eq!(serial.module_count("R"), parallel.module_count("R"));
        assert_eq!(serial.module_count("GROMACS"), parallel.module_count("GROMACS"));
        assert_eq!(serial.modules().total(), parallel.modules().total());
    }

    #[test]
    fn test_scan_parallel_keeps_tie_order() {
        let dir = TempDir::new().unwrap();
        let mut index = ModuleIndex::new();
        for i in 0..200 {
            index.insert_pair(format!("tool{}", i), format!("Mod{}", i));
            job(
                dir.path(),
                &format!("{:04}", i),
                Some(RECORD),
                &format!("tool{} input.dat\n", i),
            );
        }
        let corpus = Corpus::discover(dir.path(), &StatConfig::default()).unwrap();

        let mut serial = UsageCounters::seeded(&index);
        corpus.scan(&index, &mut serial).unwrap();
        let expected = top(serial.modules(), 200).unwrap();
        assert_eq!(expected[0].0, "Mod0");
        assert_eq!(expected[199].0, "Mod199");

        for _ in 0..5 {
            let mut parallel = UsageCounters::seeded(&index);
            corpus.scan_parallel(&index, &mut parallel, 4).unwrap();
            assert_eq!(top(parallel.modules(), 200).unwrap(), expected);
        }
    }

    #[test]
    fn test_truncated_record_is_bad_record() {
        let dir = TempDir::new().unwrap();
        job(
            dir.path(),
            "1",
            Some("<Data><Job><queue>q1h</queue><nodes>1:ppn=4"),
            "Rscript fit.R\n",
        );
        let index = index();
        let mut counters = UsageCounters::seeded(&index);
        let corpus = Corpus::discover(dir.path(), &StatConfig::default()).unwrap();
        let summary = corpus.scan(&index, &mut counters).unwrap();
        assert_eq!(summary.skipped_for(SkipReason::BadRecord), 1);
        assert_eq!(summary.analyzed, 0);
        assert_eq!(counters.module_count("R"), Some(0));
    }

    #[test]
    fn test_latin1_record_is_analyzed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1.SC"), "Rscript fit.R\n").unwrap();
        let mut record = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<Job><Job_Name>caf".to_vec();
        record.push(0xe9);
        record.extend_from_slice(b"</Job_Name><nodes>1:ppn=4</nodes></Job>");
        fs::write(dir.path().join("1.JB"), record).unwrap();

        let index = index();
        let mut counters = UsageCounters::seeded(&index);
        let corpus = Corpus::discover(dir.path(), &StatConfig::default()).unwrap();
        let summary = corpus.scan(&index, &mut counters).unwrap();
        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.skipped_for(SkipReason::Unreadable), 0);
        assert_eq!(counters.module_count("R"), Some(1));
    }

    #[test]
    fn test_scan_parallel_zero_workers() {
        let corpus = Corpus::from_paths(Vec::new(), &StatConfig::default());
        let index = index();
        let mut counters = UsageCounters::seeded(&index);
        let err = corpus.scan_parallel(&index, &mut counters, 0).unwrap_err();
        assert!(matches!(err, StatError::InvalidArgument(_)));
    }

    #[test]
    fn test_scan_level_errors_not_skipped() {
        let serde = serde_json::from_str::<u32>("").unwrap_err();
        assert_eq!(SkipReason::from_error(&StatError::WorkerPanicked), None);
        assert_eq!(SkipReason::from_error(&StatError::Serialize(serde)), None);
        assert_eq!(
            SkipReason::from_error(&StatError::InvalidArgument("x".to_string())),
            None
        );
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad");
        assert_eq!(
            SkipReason::from_error(&StatError::Io(io)),
            Some(SkipReason::Unreadable)
        );
    }

    #[test]
    fn test_summary_text() {
        let mut summary = ScanSummary {
            total: 4,
            analyzed: 3,
            ..Default::default()
        };
        summary.skip(SkipReason::NoUse);
        let text = summary.to_text();
        assert!(text.starts_with("All: 4; OK: 3; Skipped: 1 => percent OK: 75.00%"));
        assert!(text.contains("no module use: 1"));
    }
}
