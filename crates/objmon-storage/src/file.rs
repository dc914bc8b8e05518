use crate::error::Result;
use crate::{select_objectives, ObjectiveRecord, ObjectiveSource};
use objmon_common::types::{Objective, ObjectiveFilter, Role};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk shape of an objectives export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectiveFile {
    #[serde(default)]
    pub objectives: Vec<ObjectiveRecord>,
}

/// Reads objectives from a JSON export on every call, so the sweep always
/// sees the latest snapshot written by the objective system.
#[derive(Debug, Clone)]
pub struct JsonObjectiveSource {
    path: PathBuf,
}

impl JsonObjectiveSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<ObjectiveFile> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ObjectiveSource for JsonObjectiveSource {
    fn get_objectives(&self, filter: &ObjectiveFilter, role: Option<Role>) -> Result<Vec<Objective>> {
        let file = self.load()?;
        let objectives = select_objectives(&file.objectives, filter, role);
        tracing::debug!(
            path = %self.path.display(),
            count = objectives.len(),
            "Loaded objectives"
        );
        Ok(objectives)
    }
}
