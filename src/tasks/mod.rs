pub mod sim_tasks;
pub mod utility_tasks;

pub use sim_tasks::{
    load_history, PhononFlowGenTask, SimTask, TaskType, FINAL_STRUCTURE_FILE, HISTORY_FILE,
};
pub use sim_tasks::OutputCategory;
pub use utility_tasks::{
    AnaddbInput, AnaddbTask, DbConfig, DbInsertTask, FinalCleanupTask, MergeDdbTask,
    ELASTIC_TENSOR_FILE,
};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Any task an execution container can carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    Sim(SimTask),
    PhononFlowGen(PhononFlowGenTask),
    Anaddb(AnaddbTask),
    MergeDdb(MergeDdbTask),
    FinalCleanup(FinalCleanupTask),
    DbInsert(DbInsertTask),
}

impl Task {
    /// Short label used in container names and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sim(task) => task.task_type().as_str(),
            Self::PhononFlowGen(_) => "gen_ph",
            Self::Anaddb(_) => "anaddb",
            Self::MergeDdb(_) => "mrgddb",
            Self::FinalCleanup(_) => "cleanup",
            Self::DbInsert(_) => "dbinsert",
        }
    }

    /// Bind the task to its run directory, where the task kind supports
    /// result retrieval.
    pub fn set_workdir(&mut self, workdir: PathBuf) {
        match self {
            Self::Sim(task) => task.set_workdir(workdir),
            Self::Anaddb(task) => task.set_workdir(workdir),
            other => debug!(task = other.label(), "task kind has no workdir binding"),
        }
    }

    pub fn as_sim(&self) -> Option<&SimTask> {
        match self {
            Self::Sim(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_anaddb(&self) -> Option<&AnaddbTask> {
        match self {
            Self::Anaddb(task) => Some(task),
            _ => None,
        }
    }
}
