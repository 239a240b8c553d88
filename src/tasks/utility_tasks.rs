//! Utility tasks
//!
//! Bookkeeping steps appended after the scientific stages: run-directory
//! cleanup, database insertion, derivative-database merging and the anaddb
//! response-function analysis.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::errors::{FireflowError, Result};
use crate::inputs::structure::{ElasticTensor, Structure};
use crate::tasks::sim_tasks::OutputCategory;

/// File holding the elastic tensor produced by an anaddb run.
pub const ELASTIC_TENSOR_FILE: &str = "elastic_tensor.json";

/// Deletes bulky output files of the given categories from run
/// directories once a workflow has finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalCleanupTask {
    pub out_exts: Vec<OutputCategory>,
}

impl Default for FinalCleanupTask {
    fn default() -> Self {
        Self {
            out_exts: vec![OutputCategory::Wfk],
        }
    }
}

impl FinalCleanupTask {
    pub fn new(out_exts: Vec<OutputCategory>) -> Self {
        Self { out_exts }
    }

    /// Delete matching output files under `dir`, returning the number of
    /// files removed. Files match when their name ends with
    /// `_<CATEGORY>` or `_<CATEGORY>.nc`.
    pub fn clean_dir<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut removed = 0;
        let entries = std::fs::read_dir(dir)
            .map_err(|e| FireflowError::io(dir.display().to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| FireflowError::io(dir.display().to_string(), e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let matches = self.out_exts.iter().any(|ext| {
                name.ends_with(&format!("_{}", ext.as_str()))
                    || name.ends_with(&format!("_{}.nc", ext.as_str()))
            });
            if matches {
                std::fs::remove_file(&path)
                    .map_err(|e| FireflowError::io(path.display().to_string(), e))?;
                debug!(path = %path.display(), "removed output file");
                removed += 1;
            }
        }
        info!(dir = %dir.display(), removed, "run directory cleaned");
        Ok(removed)
    }
}

/// Connection settings for the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,
}

impl DbConfig {
    pub fn new<H, D, C>(host: H, port: u16, database: D, collection: C) -> Self
    where
        H: Into<String>,
        D: Into<String>,
        C: Into<String>,
    {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            collection: collection.into(),
            username: None,
        }
    }
}

/// Extracts structured results and hands them to the persistence
/// collaborator before cleanup runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbInsertTask {
    /// What to extract and under which field to insert it
    pub insertion_data: BTreeMap<String, String>,
    /// Selection criteria for the target record, if updating
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub criteria: Option<Value>,
}

impl Default for DbInsertTask {
    fn default() -> Self {
        let mut insertion_data = BTreeMap::new();
        insertion_data.insert(
            "structure".to_string(),
            "get_final_structure_and_history".to_string(),
        );
        Self {
            insertion_data,
            criteria: None,
        }
    }
}

impl DbInsertTask {
    pub fn new(insertion_data: BTreeMap<String, String>, criteria: Option<Value>) -> Self {
        Self {
            insertion_data,
            criteria,
        }
    }
}

/// Merges per-perturbation derivative databases into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDdbTask {
    pub delete_source_ddbs: bool,
}

impl Default for MergeDdbTask {
    fn default() -> Self {
        Self {
            delete_source_ddbs: true,
        }
    }
}

/// Input for an anaddb response-function analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnaddbInput {
    pub structure: Structure,
    vars: BTreeMap<String, Value>,
}

impl AnaddbInput {
    /// Analysis input for piezoelectric and elastic properties, derived
    /// from the structure's symmetry.
    pub fn piezo_elastic(structure: &Structure) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("elaflag".to_string(), Value::from(3));
        vars.insert("piezoflag".to_string(), Value::from(1));
        vars.insert("instrflag".to_string(), Value::from(1));
        vars.insert("chneut".to_string(), Value::from(1));
        Self {
            structure: structure.clone(),
            vars,
        }
    }

    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }
}

/// Post-processing analysis over a merged derivative database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnaddbTask {
    pub input: AnaddbInput,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    workdir: Option<PathBuf>,
}

impl AnaddbTask {
    pub fn new(input: AnaddbInput) -> Self {
        Self {
            input,
            workdir: None,
        }
    }

    pub fn set_workdir<P: Into<PathBuf>>(&mut self, workdir: P) {
        self.workdir = Some(workdir.into());
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// Read the elastic tensor from the bound run directory.
    pub fn get_elastic_tensor(&self) -> Result<ElasticTensor> {
        let workdir = self.workdir().ok_or_else(|| {
            FireflowError::launch("anaddb task has no working directory bound")
        })?;
        let path = workdir.join(ELASTIC_TENSOR_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| FireflowError::io(path.display().to_string(), e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cleanup_removes_only_matching_categories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["run_WFK", "run_WFK.nc", "run_DEN", "log"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let task = FinalCleanupTask::default();
        let removed = task.clean_dir(dir.path()).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("run_DEN").exists());
        assert!(dir.path().join("log").exists());
    }

    #[test]
    fn test_default_insertion_data() {
        let task = DbInsertTask::default();
        assert_eq!(
            task.insertion_data.get("structure").map(String::as_str),
            Some("get_final_structure_and_history")
        );
    }

    #[test]
    fn test_piezo_elastic_input_flags() {
        let structure = Structure::from_sites(
            [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
            vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
        );
        let input = AnaddbInput::piezo_elastic(&structure);
        assert_eq!(input.var("elaflag"), Some(&Value::from(3)));
        assert_eq!(input.var("piezoflag"), Some(&Value::from(1)));
    }

    #[test]
    fn test_elastic_tensor_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let tensor = ElasticTensor::new([[1.0; 6]; 6]);
        std::fs::write(
            dir.path().join(ELASTIC_TENSOR_FILE),
            serde_json::to_string(&tensor).unwrap(),
        )
        .unwrap();
        let structure = Structure::from_sites(
            [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
            vec![("Si", [0.0, 0.0, 0.0])],
        );
        let mut task = AnaddbTask::new(AnaddbInput::piezo_elastic(&structure));
        task.set_workdir(dir.path());
        assert_eq!(task.get_elastic_tensor().unwrap(), tensor);
    }
}
