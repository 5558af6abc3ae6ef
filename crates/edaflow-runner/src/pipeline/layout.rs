//! Run directory layout.

use std::path::{Path, PathBuf};

/// `rundir/{data,log,reports,scripts}`, created up front.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub rundir: PathBuf,
    pub data: PathBuf,
    pub log: PathBuf,
    pub reports: PathBuf,
    pub scripts: PathBuf,
}

impl RunLayout {
    pub fn new(rundir: &Path) -> Self {
        Self {
            rundir: rundir.to_path_buf(),
            data: rundir.join("data"),
            log: rundir.join("log"),
            reports: rundir.join("reports"),
            scripts: rundir.join("scripts"),
        }
    }

    pub fn create(rundir: &Path) -> std::io::Result<Self> {
        let layout = Self::new(rundir);
        for dir in [&layout.data, &layout.log, &layout.reports, &layout.scripts] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(layout)
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.scripts.join(format!("{name}.tcl"))
    }

    /// Tool `-log` argument; the tool appends its own extension.
    pub fn log_prefix(&self, name: &str) -> PathBuf {
        self.log.join(name)
    }

    /// Captured stdout/stderr of one invocation.
    pub fn console_log(&self, name: &str) -> PathBuf {
        self.log.join(format!("{name}.console.log"))
    }
}
