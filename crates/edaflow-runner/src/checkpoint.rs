//! Checkpoint Store.
//!
//! One opaque artifact per completed stage, named after the stage, under the
//! run's data directory. Existence is the only completion signal; the
//! contents belong to the tool.

use std::path::{Path, PathBuf};

use crate::pipeline::ToolFamily;

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Directory the tool runs in; script paths are relative to it.
    workdir: PathBuf,
    data_dir: PathBuf,
    family: ToolFamily,
}

impl CheckpointStore {
    pub fn new(
        workdir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        family: ToolFamily,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            data_dir: data_dir.into(),
            family,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Absolute location of `stage`'s checkpoint.
    pub fn path(&self, stage: &str) -> PathBuf {
        self.data_dir.join(self.file_name(stage))
    }

    /// Location as written into scripts: relative to the working directory
    /// when the data directory lies under it, absolute otherwise.
    pub fn relative_path(&self, stage: &str) -> String {
        let file = self.file_name(stage);
        self.data_dir
            .strip_prefix(&self.workdir)
            .map_or_else(|_| self.data_dir.join(&file), |rel| rel.join(&file))
            .display()
            .to_string()
    }

    fn file_name(&self, stage: &str) -> String {
        format!("{stage}.{}", self.family.checkpoint_extension())
    }

    pub fn exists(&self, stage: &str) -> bool {
        self.path(stage).exists()
    }

    /// Last stage of the longest prefix of `stages` whose checkpoints all
    /// exist; where an incremental run resumes from.
    pub fn last_completed<'a>(&self, stages: &'a [String]) -> Option<&'a str> {
        stages
            .iter()
            .take_while(|s| self.exists(s))
            .last()
            .map(String::as_str)
    }

    /// Script statement restoring `stage`'s checkpoint.
    pub fn load_statement(&self, stage: &str) -> String {
        let path = self.relative_path(stage);
        match self.family {
            ToolFamily::Genus => format!("read_db {path}"),
            ToolFamily::Innovus => format!("source {path}"),
        }
    }

    /// Script statement writing `stage`'s checkpoint.
    pub fn save_statement(&self, stage: &str) -> String {
        let path = self.relative_path(stage);
        match self.family {
            ToolFamily::Genus => format!("write_db {path}"),
            ToolFamily::Innovus => format!("saveDesign {path}"),
        }
    }
}
