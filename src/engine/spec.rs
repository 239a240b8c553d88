//! Execution specifications
//!
//! Per-container execution parameters, kept as a flat string-keyed map the
//! external engine understands, with typed accessors for the keys this
//! layer cares about. Specs have value semantics: every container
//! construction copies the map, so mutating one container's spec never
//! affects a sibling built from the same base.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::errors::{FireflowError, Result};

/// Spec key: number of MPI ranks for the container's tasks.
pub const KEY_MPI_NCPUS: &str = "mpi_ncpus";
/// Spec key: queue-adapter profile handed to the resource manager.
pub const KEY_QUEUE_ADAPTER: &str = "_queueadapter";
/// Spec key: scheduling priority.
pub const KEY_PRIORITY: &str = "_priority";
/// Spec key: workflow-wide initialization mapping.
pub const KEY_INITIALIZATION_INFO: &str = "initialization_info";
/// Spec key: stage index used for graph traversal after execution.
pub const KEY_TASK_INDEX: &str = "wf_task_index";
/// Spec key: task types whose derivative databases a merge step collects.
pub const KEY_DDB_TASK_TYPES: &str = "ddb_files_task_types";
/// Spec key: database connection settings for the insertion step.
pub const KEY_DB_CONFIG: &str = "db_config";

/// Queue-adapter profile for the resource manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueAdapterSpec {
    pub ntasks: u32,
    /// Wall-time limit, "HH:MM:SS"
    pub walltime: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub queue: Option<String>,
}

impl QueueAdapterSpec {
    /// Profile sized for a short single-core dry run.
    pub fn short_single_core() -> Self {
        Self {
            ntasks: 1,
            walltime: "00:10:00".to_string(),
            queue: None,
        }
    }

    /// Load a profile from a JSON or YAML file, selected by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FireflowError::io(path.display().to_string(), e))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&text)?),
            _ => Ok(serde_json::from_str(&text)?),
        }
    }
}

/// Stage of a workflow a container belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scf,
    Ion,
    Ioncell,
    Nscf,
    Hybrid,
    GenPh,
    Ddk,
    StrainPert,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scf => "scf",
            Self::Ion => "ion",
            Self::Ioncell => "ioncell",
            Self::Nscf => "nscf",
            Self::Hybrid => "hybrid",
            Self::GenPh => "gen_ph",
            Self::Ddk => "ddk",
            Self::StrainPert => "strain_pert",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a container within its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sequence {
    /// Parallelism dry run, not a production step
    Autoparal,
    Number(u32),
}

/// Structured stage index stored in a container's spec.
///
/// Replaces the legacy parse-able `"<stage>_<n>"` string; `Display` still
/// renders that form for container names and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WfTaskIndex {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seq: Option<Sequence>,
}

impl WfTaskIndex {
    pub fn numbered(stage: Stage, seq: u32) -> Self {
        Self {
            stage,
            seq: Some(Sequence::Number(seq)),
        }
    }

    pub fn autoparal(stage: Stage) -> Self {
        Self {
            stage,
            seq: Some(Sequence::Autoparal),
        }
    }

    pub fn unnumbered(stage: Stage) -> Self {
        Self { stage, seq: None }
    }

    /// Numeric sequence, if this is a numbered production step.
    pub fn number(&self) -> Option<u32> {
        match self.seq {
            Some(Sequence::Number(n)) => Some(n),
            _ => None,
        }
    }

    pub fn is_autoparal(&self) -> bool {
        matches!(self.seq, Some(Sequence::Autoparal))
    }
}

impl fmt::Display for WfTaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seq {
            Some(Sequence::Number(n)) => write!(f, "{}_{}", self.stage, n),
            Some(Sequence::Autoparal) => write!(f, "{}_autoparal", self.stage),
            None => write!(f, "{}", self.stage),
        }
    }
}

/// Flat execution specification for one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecSpec {
    #[serde(flatten)]
    entries: BTreeMap<String, Value>,
}

impl ExecSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert<K: Into<String>, V: Serialize>(&mut self, key: K, value: V) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entries.insert(key.into(), json_value);
        }
    }

    pub fn set_mpi_ncpus(&mut self, ncpus: u32) {
        self.insert(KEY_MPI_NCPUS, ncpus);
    }

    pub fn mpi_ncpus(&self) -> Option<u32> {
        self.get(KEY_MPI_NCPUS).and_then(Value::as_u64).map(|n| n as u32)
    }

    pub fn set_queue_adapter(&mut self, adapter: &QueueAdapterSpec) {
        self.insert(KEY_QUEUE_ADAPTER, adapter);
    }

    pub fn queue_adapter(&self) -> Option<QueueAdapterSpec> {
        self.get(KEY_QUEUE_ADAPTER)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_priority(&mut self, priority: i64) {
        self.insert(KEY_PRIORITY, priority);
    }

    pub fn set_initialization_info(&mut self, info: &BTreeMap<String, Value>) {
        self.insert(KEY_INITIALIZATION_INFO, info);
    }

    pub fn initialization_info(&self) -> Option<&Value> {
        self.get(KEY_INITIALIZATION_INFO)
    }

    pub fn set_task_index(&mut self, index: WfTaskIndex) {
        self.insert(KEY_TASK_INDEX, index);
    }

    /// Structured stage index, if present and well formed. A malformed
    /// entry is skipped with a debug log, never an error.
    pub fn task_index(&self) -> Option<WfTaskIndex> {
        let value = self.get(KEY_TASK_INDEX)?;
        match serde_json::from_value(value.clone()) {
            Ok(index) => Some(index),
            Err(e) => {
                debug!(error = %e, "skipping malformed stage index entry");
                None
            }
        }
    }
}

/// Copy `base` (or start empty) and downgrade it to the short single-core
/// profile used for autoparal dry runs and lightweight utility steps.
pub fn short_single_core_spec(base: Option<&ExecSpec>) -> ExecSpec {
    let mut spec = base.cloned().unwrap_or_default();
    spec.set_mpi_ncpus(1);
    spec.set_queue_adapter(&QueueAdapterSpec::short_single_core());
    spec
}
