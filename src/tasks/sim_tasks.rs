//! Simulation task wrappers
//!
//! One `SimTask` wraps one invocation of the simulation code: a calculation
//! input (ready or deferred), a task-type tag, and the declared data
//! dependencies on earlier tasks. Tasks are immutable after construction
//! except for the working-directory binding used during result retrieval.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::errors::{FireflowError, Result};
use crate::inputs::factories::{InputSource, PhononsFromGsFactory};
use crate::inputs::structure::Structure;

/// File holding the relaxed structure in a completed run directory.
pub const FINAL_STRUCTURE_FILE: &str = "final_structure.json";
/// Companion history record written next to the run outputs.
pub const HISTORY_FILE: &str = "history.json";

/// Calculation type performed by a simulation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Scf,
    Relax,
    Nscf,
    Hybrid,
    Ddk,
    StrainPert,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scf => "scf",
            Self::Relax => "relax",
            Self::Nscf => "nscf",
            Self::Hybrid => "hybrid",
            Self::Ddk => "ddk",
            Self::StrainPert => "strain_pert",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output-file category a downstream task can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputCategory {
    /// Charge density
    Den,
    /// Wavefunctions
    Wfk,
    /// d/dk wavefunction derivatives
    Ddk,
    /// Derivative database
    Ddb,
}

impl OutputCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Den => "DEN",
            Self::Wfk => "WFK",
            Self::Ddk => "DDK",
            Self::Ddb => "DDB",
        }
    }
}

impl fmt::Display for OutputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executable unit wrapping one calculation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimTask {
    task_type: TaskType,
    pub input: InputSource,
    /// Declared input dependencies: producing task type -> required output
    deps: BTreeMap<TaskType, OutputCategory>,
    pub autoparal: bool,
    /// Auxiliary convergence target for constrained relaxation
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_dilatmx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    workdir: Option<PathBuf>,
}

impl SimTask {
    pub fn new(task_type: TaskType, input: InputSource) -> Self {
        Self {
            task_type,
            input,
            deps: BTreeMap::new(),
            autoparal: false,
            target_dilatmx: None,
            workdir: None,
        }
    }

    pub fn with_autoparal(mut self, autoparal: bool) -> Self {
        self.autoparal = autoparal;
        self
    }

    /// Declare a dependency on `producer`'s output of the given category.
    pub fn with_dep(mut self, producer: TaskType, category: OutputCategory) -> Self {
        self.deps.insert(producer, category);
        self
    }

    /// Constrained relaxation that iterates until the lattice-dilatation
    /// guard converges to `target`.
    pub fn with_target_dilatmx(mut self, target: f64) -> Self {
        self.target_dilatmx = Some(target);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn deps(&self) -> &BTreeMap<TaskType, OutputCategory> {
        &self.deps
    }

    /// Bind the task to its actual run directory after execution.
    pub fn set_workdir<P: Into<PathBuf>>(&mut self, workdir: P) {
        self.workdir = Some(workdir.into());
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    fn bound_workdir(&self) -> Result<&Path> {
        self.workdir().ok_or_else(|| {
            FireflowError::launch(format!(
                "task '{}' has no working directory bound",
                self.task_type
            ))
        })
    }

    /// Read the relaxed structure from the bound run directory.
    pub fn get_final_structure(&self) -> Result<Structure> {
        let path = self.bound_workdir()?.join(FINAL_STRUCTURE_FILE);
        debug!(path = %path.display(), "loading final structure");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| FireflowError::io(path.display().to_string(), e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Task that expands a phonon factory into a full perturbation flow once
/// the preceding ground-state run has completed. The expansion itself is
/// owned by the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhononFlowGenTask {
    pub factory: PhononsFromGsFactory,
    pub previous_task_type: TaskType,
    pub with_autoparal: bool,
}

impl PhononFlowGenTask {
    pub fn new(factory: PhononsFromGsFactory, previous_task_type: TaskType) -> Self {
        Self {
            factory,
            previous_task_type,
            with_autoparal: false,
        }
    }

    pub fn with_autoparal(mut self, with_autoparal: bool) -> Self {
        self.with_autoparal = with_autoparal;
        self
    }
}

/// Load the serialized history record from a run directory.
pub fn load_history<P: AsRef<Path>>(dir: P) -> Result<Value> {
    let path = dir.as_ref().join(HISTORY_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| FireflowError::io(path.display().to_string(), e))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::input::CalcInput;
    use pretty_assertions::assert_eq;

    fn si_input() -> InputSource {
        let structure = Structure::from_sites(
            [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
            vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
        );
        InputSource::ready(CalcInput::new(structure))
    }

    #[test]
    fn test_dep_declaration() {
        let task = SimTask::new(TaskType::Nscf, si_input())
            .with_dep(TaskType::Scf, OutputCategory::Den);
        assert_eq!(task.deps().get(&TaskType::Scf), Some(&OutputCategory::Den));
        assert_eq!(task.task_type(), TaskType::Nscf);
    }

    #[test]
    fn test_unbound_workdir_is_launch_error() {
        let task = SimTask::new(TaskType::Relax, si_input());
        let err = task.get_final_structure().unwrap_err();
        assert_eq!(err.category(), "launch");
    }

    #[test]
    fn test_final_structure_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let structure = Structure::from_sites(
            [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
            vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
        );
        std::fs::write(
            dir.path().join(FINAL_STRUCTURE_FILE),
            serde_json::to_string(&structure).unwrap(),
        )
        .unwrap();

        let mut task = SimTask::new(TaskType::Relax, si_input());
        task.set_workdir(dir.path());
        assert_eq!(task.get_final_structure().unwrap(), structure);
    }

    #[test]
    fn test_history_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), r#"{"steps": 3}"#).unwrap();
        let history = load_history(dir.path()).unwrap();
        assert_eq!(history["steps"], 3);
    }
}
