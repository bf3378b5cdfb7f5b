//! One job: its metadata record and its analyzed script
//!
//! A job script `ID.SC` always sits next to its record `ID.JB`. Both files
//! must exist before either is parsed.

use crate::error::{Result, StatError};
use crate::job_record::JobAttributes;
use crate::script::{ScriptAnalysis, BASELINE_EPOCH};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metadata and script analysis of a single job
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRecord {
    pub script_path: PathBuf,
    pub record_path: PathBuf,
    pub attributes: JobAttributes,
    pub analysis: ScriptAnalysis,
}

impl ScriptRecord {
    /// Open a job from its script path using the `SC`/`JB` convention
    pub fn open<P: AsRef<Path>>(script_path: P) -> Result<Self> {
        Self::open_with(script_path, "SC", "JB", BASELINE_EPOCH)
    }

    /// Open a job with explicit extensions and baseline toolchain
    pub fn open_with<P: AsRef<Path>>(
        script_path: P,
        script_extension: &str,
        record_extension: &str,
        baseline: u16,
    ) -> Result<Self> {
        let script_path = script_path.as_ref();
        if !script_path.exists() {
            return Err(StatError::not_found(script_path));
        }
        let record_path = companion_record_path(script_path, script_extension, record_extension)
            .ok_or_else(|| StatError::not_found(script_path.with_extension(record_extension)))?;
        if !record_path.exists() {
            debug!(script = %script_path.display(), "companion record missing");
            return Err(StatError::not_found(&record_path));
        }

        let attributes = JobAttributes::from_file(&record_path)?;
        let analysis = ScriptAnalysis::from_file_with_baseline(script_path, baseline)?;

        Ok(Self {
            script_path: script_path.to_path_buf(),
            record_path,
            attributes,
            analysis,
        })
    }
}

/// Path of the metadata record belonging to a job script
///
/// Returns `None` when the script does not carry `script_extension`.
///
/// # Example
/// ```
/// use modstat::record::companion_record_path;
/// use std::path::{Path, PathBuf};
///
/// let record = companion_record_path(Path::new("/jobs/1.moab.SC"), "SC", "JB");
/// assert_eq!(record, Some(PathBuf::from("/jobs/1.moab.JB")));
/// assert_eq!(companion_record_path(Path::new("/jobs/1.sh"), "SC", "JB"), None);
/// ```
pub fn companion_record_path(
    script_path: &Path,
    script_extension: &str,
    record_extension: &str,
) -> Option<PathBuf> {
    match script_path.extension() {
        Some(ext) if ext == script_extension => Some(script_path.with_extension(record_extension)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_job(dir: &Path, id: &str, record: Option<&str>, script: &str) -> PathBuf {
        let script_path = dir.join(format!("{}.SC", id));
        fs::write(&script_path, script).unwrap();
        if let Some(record) = record {
            fs::write(dir.join(format!("{}.JB", id)), record).unwrap();
        }
        script_path
    }

    #[test]
    fn test_open_composes_both_parsers() {
        let dir = TempDir::new().unwrap();
        let path = write_job(
            dir.path(),
            "20602304.moab",
            Some("<Job><queue>q1h</queue><nodes>1:ppn=4</nodes></Job>"),
            "source switch_to_2016a\nmodule load Python/3.6.1\n",
        );
        let record = ScriptRecord::open(&path).unwrap();
        assert_eq!(record.attributes.queue.as_deref(), Some("q1h"));
        assert_eq!(record.attributes.cores_per_node(), 4);
        assert_eq!(record.analysis.toolchain(), 2016);
        assert!(record.analysis.loaded().contains_key("Python"));
        assert_eq!(record.record_path, dir.path().join("20602304.moab.JB"));
    }

    #[test]
    fn test_missing_script() {
        let dir = TempDir::new().unwrap();
        let err = ScriptRecord::open(dir.path().join("nothing.SC")).unwrap_err();
        assert!(matches!(err, StatError::NotFound { .. }));
    }

    #[test]
    fn test_missing_companion() {
        let dir = TempDir::new().unwrap();
        let path = write_job(dir.path(), "42", None, "echo hi there\n");
        let err = ScriptRecord::open(&path).unwrap_err();
        match err {
            StatError::NotFound { path } => assert!(path.ends_with("42.JB")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.sh");
        fs::write(&path, "echo hi there\n").unwrap();
        let err = ScriptRecord::open(&path).unwrap_err();
        assert!(matches!(err, StatError::NotFound { .. }));
    }

    #[test]
    fn test_malformed_node_spec_fails_job() {
        let dir = TempDir::new().unwrap();
        let path = write_job(
            dir.path(),
            "7",
            Some("<Job><nodes>1:2:3:4</nodes></Job>"),
            "module load R\n",
        );
        let err = ScriptRecord::open(&path).unwrap_err();
        assert!(matches!(err, StatError::MalformedSpec { .. }));
    }

    #[test]
    fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("9.pbs");
        fs::write(&script, "module load R\n").unwrap();
        fs::write(dir.path().join("9.xml"), "<Job/>").unwrap();
        let record = ScriptRecord::open_with(&script, "pbs", "xml", 2018).unwrap();
        assert_eq!(record.analysis.toolchain(), 2018);
    }
}
