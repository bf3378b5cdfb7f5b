use crate::error::{Result, StatError};
use crate::module_index::{ExecutableEntry, ModuleIndex};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

impl ModuleIndex {
    /// Write `executable module` pairs, one per line, sorted by executable
    pub fn write_executables<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut pairs: Vec<(&String, &String)> = self.executables.iter().collect();
        pairs.sort();

        let mut out = BufWriter::new(File::create(path.as_ref())?);
        for (executable, module) in &pairs {
            writeln!(out, "{} {}", executable, module)?;
        }
        out.flush()?;

        info!(path = %path.as_ref().display(), lines = pairs.len(), "executable table written");
        Ok(pairs.len())
    }

    /// Write `epoch module version executable` lines in discovery order
    pub fn write_tuples<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        for entry in &self.entries {
            writeln!(
                out,
                "{} {} {} {}",
                entry.epoch, entry.module, entry.version, entry.executable
            )?;
        }
        out.flush()?;

        info!(path = %path.as_ref().display(), lines = self.entries.len(), "tuple table written");
        Ok(self.entries.len())
    }

    /// Reload a table written by `write_executables` or `write_tuples`
    ///
    /// Lines are replayed in order, so the last line for an executable wins.
    /// Does nothing and returns 0 when the executable map is already
    /// populated. Lines with a column count other than 2 or 4 are skipped.
    pub fn load_table<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        if !self.executables.is_empty() {
            warn!(path = %path.display(), "executable map already populated, table ignored");
            return Ok(0);
        }
        if !path.exists() {
            return Err(StatError::not_found(path));
        }

        let content = fs::read_to_string(path)?;
        let mut loaded = 0;
        for (lineno, line) in content.lines().enumerate() {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [] => {}
                [executable, module] => {
                    self.insert_pair(*executable, *module);
                    loaded += 1;
                }
                [epoch, module, version, executable] => match epoch.parse::<u16>() {
                    Ok(epoch) => {
                        self.insert(ExecutableEntry {
                            epoch,
                            module: module.to_string(),
                            version: version.to_string(),
                            executable: executable.to_string(),
                        });
                        loaded += 1;
                    }
                    Err(_) => warn!(line = lineno + 1, "bad epoch in executable table"),
                },
                _ => warn!(
                    line = lineno + 1,
                    columns = columns.len(),
                    "unexpected column count in executable table"
                ),
            }
        }

        info!(path = %path.display(), loaded, "executable table loaded");
        Ok(loaded)
    }
}
