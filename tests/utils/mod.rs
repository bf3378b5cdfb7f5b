// Integration test utilities
//
// Builds a small module repository and a job-script corpus on disk so the
// binary and the library can be exercised end to end.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const RECORD_HASWELL: &str = r#"<?xml version="1.0"?>
<Data>
  <Job>
    <JobId>20602304.moab.tier2.leuven.vsc</JobId>
    <jobid>20602304.moab.tier2.leuven.vsc</jobid>
    <Job_Name>md_run</Job_Name>
    <queue>q24h</queue>
    <Resource_List>
      <nodes>2:ppn=20:haswell</nodes>
      <walltime>24:00:00</walltime>
    </Resource_List>
    <euser>vsc30001</euser>
  </Job>
</Data>
"#;

pub const RECORD_MALFORMED_NODES: &str =
    "<Job><jobid>1</jobid><Resource_List><nodes>1:2:3:4</nodes></Resource_List></Job>";

/// Touch an empty file, creating parents
pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("create parents");
    fs::write(path, "").expect("write file");
}

/// A module repository with two epochs under `<dir>/repo`
pub struct Site {
    pub dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("repo");

        touch(&root.join("2015a/software/MATLAB/R2015a/bin64/matlab"));
        touch(&root.join("2015a/software/R/3.2.1-intel-2015a/bin/Rscript"));
        touch(&root.join("2015a/software/R/3.2.1-intel-2015a/bin/libR.so"));
        touch(&root.join("2016a/software/GROMACS/5.1.2/install/bin/gmx"));
        touch(&root.join("2016a/software/Python/3.6.1/bin/python"));
        touch(&root.join("2016a/software/accounting/1.0/bin/charge"));

        touch(&root.join("2015a/modules/all/MATLAB/R2015a"));
        touch(&root.join("2015a/modules/all/R/3.2.1-intel-2015a"));
        touch(&root.join("2016a/modules/all/GROMACS/5.1.2"));
        touch(&root.join("2016a/modules/all/Python/3.6.1"));

        let site = Site { dir };
        fs::write(
            site.config_path(),
            format!(
                "repository = \"{}\"\nepochs = [2015, 2016]\n",
                root.display()
            ),
        )
        .expect("write config");
        site
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("modstat.toml")
    }

    pub fn corpus_dir(&self) -> PathBuf {
        self.dir.path().join("jobscripts")
    }

    /// Write `<id>.SC` and, when given, `<id>.JB` under the corpus directory
    pub fn job(&self, subdir: &str, id: &str, record: Option<&str>, script: &str) -> PathBuf {
        let dir = self.corpus_dir().join(subdir);
        fs::create_dir_all(&dir).expect("create corpus dir");
        let script_path = dir.join(format!("{}.SC", id));
        fs::write(&script_path, script).expect("write script");
        if let Some(record) = record {
            fs::write(dir.join(format!("{}.JB", id)), record).expect("write record");
        }
        script_path
    }

    /// A corpus with three usable jobs and two broken ones
    pub fn with_corpus(self) -> Self {
        self.job(
            "2017-10-21",
            "1",
            Some(RECORD_HASWELL),
            "#!/bin/bash -l\n#PBS -l nodes=2:ppn=20\nsource switch_to_2016a\nmodule load GROMACS/5.1.2\nmpirun gmx mdrun -deffnm md\n",
        );
        self.job(
            "2017-10-21",
            "2",
            Some(RECORD_HASWELL),
            "module load Python/3.6.1\npython analyse.py out.dat\n",
        );
        self.job(
            "2017-10-22",
            "3",
            Some(RECORD_HASWELL),
            "cd $PBS_O_WORKDIR\nRscript fit.R > fit.log\n",
        );
        self.job("2017-10-22", "4", None, "Rscript fit.R\n");
        self.job(
            "2017-10-22",
            "5",
            Some(RECORD_MALFORMED_NODES),
            "matlab -nodisplay -r \"run 1\"\n",
        );
        self
    }
}
