//! Result retrieval
//!
//! Operations over a completed (or partially completed) workflow graph:
//! locate the container holding the authoritative final result, bind its
//! task to the actual run directory, extract structured data, and account
//! for the compute time spent.
//!
//! Dispatch is polymorphic over the typed workflow kind stored in the
//! graph metadata; a kind mismatch is always fatal, never a partial
//! result.

use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use crate::core::errors::{FireflowError, Result};
use crate::engine::firework::{FwId, Workflow, WorkflowKind};
use crate::engine::spec::Stage;
use crate::inputs::structure::Structure;
use crate::tasks::{load_history, Task};
use crate::workflows::builders::{PiezoElasticWorkflow, RelaxWorkflow};

/// Final structure of a relaxation, plus the companion history record.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureAndHistory {
    pub structure: Structure,
    pub history: Value,
}

/// Elastic properties from a response-function analysis, plus history.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticAndHistory {
    pub elastic_properties: Value,
    pub history: Value,
}

/// Fail unless the graph was produced by the expected builder kind.
pub fn expect_kind(wf: &Workflow, expected: WorkflowKind) -> Result<()> {
    match wf.kind() {
        Some(kind) if kind == expected => Ok(()),
        Some(kind) => Err(FireflowError::mismatch(expected.as_str(), kind.as_str())),
        None => Err(FireflowError::mismatch(expected.as_str(), "untagged")),
    }
}

/// Find the container holding the final production step of `stage`: the
/// maximum numeric sequence wins, ties go to the larger container id, and
/// autoparal dry runs never match.
fn final_stage_fw_id(wf: &Workflow, stage: Stage) -> Result<FwId> {
    let mut best: Option<(u32, FwId)> = None;
    for fw in wf.fireworks() {
        let Some(index) = fw.spec.task_index() else {
            continue;
        };
        if index.stage != stage {
            continue;
        }
        let Some(number) = index.number() else {
            debug!(fw_id = fw.fw_id, %index, "skipping non-production stage entry");
            continue;
        };
        let candidate = (number, fw.fw_id);
        if best.map_or(true, |current| candidate > current) {
            best = Some(candidate);
        }
    }
    best.map(|(_, fw_id)| fw_id)
        .ok_or_else(|| FireflowError::not_found(format!("final {stage} container")))
}

/// Bind the container's last task to its most recent launch directory
/// (archived or active, chronological order) and return that directory.
fn bind_last_task(wf: &mut Workflow, fw_id: FwId) -> Result<PathBuf> {
    let fw = wf
        .get_mut(fw_id)
        .ok_or_else(|| FireflowError::internal(format!("container {fw_id} not in graph")))?;
    let launch_dir = fw
        .most_recent_launch()
        .map(|launch| launch.launch_dir.clone())
        .ok_or_else(|| {
            FireflowError::launch(format!("container '{}' has no recorded launches", fw.name))
        })?;
    let task = fw.tasks.last_mut().ok_or_else(|| {
        FireflowError::launch(format!("container '{}' holds no tasks", fw.name))
    })?;
    task.set_workdir(launch_dir.clone());
    Ok(launch_dir)
}

/// Extract the final structure and history record from the last
/// production container of `stage`.
pub fn final_structure_and_history(wf: &mut Workflow, stage: Stage) -> Result<StructureAndHistory> {
    let fw_id = final_stage_fw_id(wf, stage)?;
    let launch_dir = bind_last_task(wf, fw_id)?;
    let fw = wf
        .get(fw_id)
        .ok_or_else(|| FireflowError::internal(format!("container {fw_id} not in graph")))?;
    let task = fw.tasks.last().and_then(Task::as_sim).ok_or_else(|| {
        FireflowError::launch(format!(
            "container '{}' holds no simulation task to read results from",
            fw.name
        ))
    })?;
    let structure = task.get_final_structure()?;
    let history = load_history(&launch_dir)?;
    Ok(StructureAndHistory { structure, history })
}

/// Polymorphic entry point: dispatch the final-structure extraction over
/// the graph's typed kind.
pub fn retrieve_final_structure(wf: &mut Workflow) -> Result<StructureAndHistory> {
    match wf.kind() {
        Some(WorkflowKind::Relax) => final_structure_and_history(wf, Stage::Ioncell),
        Some(kind) => Err(FireflowError::mismatch("relax", kind.as_str())),
        None => Err(FireflowError::mismatch("relax", "untagged")),
    }
}

/// Ids of every container carrying an anaddb analysis task, ascending.
fn anaddb_fw_ids(wf: &Workflow) -> Vec<FwId> {
    wf.fireworks()
        .filter(|fw| fw.tasks.iter().any(|task| task.as_anaddb().is_some()))
        .map(|fw| fw.fw_id)
        .collect()
}

fn elastic_from_container(wf: &mut Workflow, fw_id: FwId) -> Result<ElasticAndHistory> {
    let launch_dir = bind_last_task(wf, fw_id)?;
    let fw = wf
        .get(fw_id)
        .ok_or_else(|| FireflowError::internal(format!("container {fw_id} not in graph")))?;
    let task = fw
        .tasks
        .iter()
        .rev()
        .find_map(Task::as_anaddb)
        .ok_or_else(|| FireflowError::internal("anaddb task disappeared from container"))?;
    let tensor = task.get_elastic_tensor()?;
    let history = load_history(&launch_dir)?;
    Ok(ElasticAndHistory {
        elastic_properties: tensor.extended_map(),
        history,
    })
}

/// Extract the elastic tensor and history from the last anaddb container.
pub fn elastic_tensor_and_history(wf: &mut Workflow) -> Result<ElasticAndHistory> {
    let fw_id = anaddb_fw_ids(wf)
        .last()
        .copied()
        .ok_or_else(|| FireflowError::not_found("final anaddb container"))?;
    elastic_from_container(wf, fw_id)
}

/// Extract elastic tensors from every anaddb container, ascending id
/// order.
pub fn all_elastic_tensors(wf: &mut Workflow) -> Result<Vec<ElasticAndHistory>> {
    let ids = anaddb_fw_ids(wf);
    if ids.is_empty() {
        return Err(FireflowError::not_found("final anaddb container"));
    }
    ids.into_iter()
        .map(|fw_id| elastic_from_container(wf, fw_id))
        .collect()
}

/// Core-hours proxy over the whole graph: autoparal dry runs contribute
/// their runtime, production containers contribute runtime x CPU count.
/// Containers without a stage index or without launches contribute
/// nothing.
pub fn runtime_secs(wf: &Workflow) -> f64 {
    let mut total = 0.0;
    for fw in wf.fireworks() {
        let Some(index) = fw.spec.task_index() else {
            continue;
        };
        let Some(launch) = fw.last_launch() else {
            continue;
        };
        if index.is_autoparal() {
            total += launch.runtime_secs;
        } else {
            total += launch.runtime_secs * f64::from(fw.spec.mpi_ncpus().unwrap_or(1));
        }
    }
    total
}

impl RelaxWorkflow {
    /// Locate the final ion+cell relaxation step of a completed graph and
    /// extract its structure and history.
    pub fn get_final_structure_and_history(wf: &mut Workflow) -> Result<StructureAndHistory> {
        expect_kind(wf, WorkflowKind::Relax)?;
        final_structure_and_history(wf, Stage::Ioncell)
    }

    /// Total compute time spent by a completed graph, in core-seconds.
    pub fn get_runtime_secs(wf: &Workflow) -> Result<f64> {
        expect_kind(wf, WorkflowKind::Relax)?;
        Ok(runtime_secs(wf))
    }
}

impl PiezoElasticWorkflow {
    pub fn get_elastic_tensor_and_history(wf: &mut Workflow) -> Result<ElasticAndHistory> {
        expect_kind(wf, WorkflowKind::PiezoElastic)?;
        elastic_tensor_and_history(wf)
    }

    pub fn get_all_elastic_tensors(wf: &mut Workflow) -> Result<Vec<ElasticAndHistory>> {
        expect_kind(wf, WorkflowKind::PiezoElastic)?;
        all_elastic_tensors(wf)
    }
}
