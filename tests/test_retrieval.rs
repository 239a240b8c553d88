//! Test suite for result retrieval
//!
//! Materializes run directories on disk, records launches the way the
//! engine would, and exercises the retrieval and accounting helpers.

use anyhow::Result;
use serde_json::json;

use fireflow::engine::firework::{Firework, Launch, Workflow, WorkflowKind, WorkflowMetadata};
use fireflow::engine::spec::{ExecSpec, Stage, WfTaskIndex};
use fireflow::inputs::factories::InputSource;
use fireflow::inputs::input::CalcInput;
use fireflow::inputs::structure::{ElasticTensor, Structure};
use fireflow::tasks::{ELASTIC_TENSOR_FILE, FINAL_STRUCTURE_FILE, HISTORY_FILE};
use fireflow::{FwWorkflow, PiezoElasticWorkflow, RelaxWorkflow, ScfWorkflow, WorkflowOptions};

fn si_structure() -> Structure {
    Structure::from_sites(
        [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
        vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
    )
}

fn si_input() -> CalcInput {
    CalcInput::new(si_structure())
}

/// Write a completed run directory holding the relaxed structure and a
/// history record.
fn write_structure_rundir(dir: &std::path::Path, structure: &Structure) {
    std::fs::write(
        dir.join(FINAL_STRUCTURE_FILE),
        serde_json::to_string(structure).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.join(HISTORY_FILE), r#"{"num_restarts": 0}"#).unwrap();
}

#[test]
fn test_final_structure_retrieval() -> Result<()> {
    let relax = RelaxWorkflow::new(
        si_input(),
        InputSource::ready(si_input()),
        None,
        WorkflowOptions::default(),
    )?;
    let mut wf = relax.workflow().clone();

    let rundir = tempfile::tempdir()?;
    let relaxed = si_structure();
    write_structure_rundir(rundir.path(), &relaxed);
    wf.get_mut(relax.ioncell_fw)
        .expect("ioncell container")
        .record_launch(Launch::completed(rundir.path(), 120.0));

    let result = RelaxWorkflow::get_final_structure_and_history(&mut wf)?;
    assert_eq!(result.structure, relaxed);
    assert_eq!(result.history["num_restarts"], json!(0));
    Ok(())
}

/// When a stage was continued (restarted with a higher sequence), the
/// scan picks the container with the maximum numeric index.
#[test]
fn test_scan_picks_highest_sequence() -> Result<()> {
    let relax = RelaxWorkflow::new(
        si_input(),
        InputSource::ready(si_input()),
        None,
        WorkflowOptions::default(),
    )?;
    let mut wf = relax.workflow().clone();

    // the engine appended a continuation of the ioncell stage
    let mut spec = ExecSpec::new();
    spec.set_task_index(WfTaskIndex::numbered(Stage::Ioncell, 2));
    let continuation = Firework::new(
        vec![fireflow::Task::Sim(fireflow::SimTask::new(
            fireflow::TaskType::Relax,
            InputSource::ready(si_input()),
        ))],
        &spec,
    );
    let continuation_id = wf.append_firework(continuation);

    let stale_dir = tempfile::tempdir()?;
    write_structure_rundir(
        stale_dir.path(),
        &Structure::from_sites(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            vec![("Si", [0.0, 0.0, 0.0])],
        ),
    );
    wf.get_mut(relax.ioncell_fw)
        .expect("ioncell container")
        .record_launch(Launch::completed(stale_dir.path(), 60.0));

    let final_dir = tempfile::tempdir()?;
    let relaxed = si_structure();
    write_structure_rundir(final_dir.path(), &relaxed);
    wf.get_mut(continuation_id)
        .expect("continuation container")
        .record_launch(Launch::completed(final_dir.path(), 60.0));

    let result = RelaxWorkflow::get_final_structure_and_history(&mut wf)?;
    assert_eq!(result.structure, relaxed);
    Ok(())
}

/// A graph without any container matching the expected stage fails
/// fatally, never returning a partial result.
#[test]
fn test_missing_final_stage_is_fatal() {
    let mut spec = ExecSpec::new();
    spec.set_task_index(WfTaskIndex::numbered(Stage::Scf, 1));
    let fw = Firework::new(Vec::new(), &spec);
    let mut wf = Workflow::new(vec![fw], Vec::new())
        .unwrap()
        .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Relax));

    let err = RelaxWorkflow::get_final_structure_and_history(&mut wf).unwrap_err();
    assert_eq!(err.category(), "not_found");
}

/// Dispatching retrieval against a graph built by a different builder is
/// a fatal mismatch.
#[test]
fn test_kind_mismatch_is_fatal() -> Result<()> {
    let scf = ScfWorkflow::new(si_input(), WorkflowOptions::default())?;
    let mut wf = scf.workflow().clone();
    let err = RelaxWorkflow::get_final_structure_and_history(&mut wf).unwrap_err();
    assert_eq!(err.category(), "mismatch");
    Ok(())
}

/// Core-hours accounting: one autoparal dry run (runtime 10) plus one
/// production container (runtime 20 on 4 cores) totals 90.
#[test]
fn test_runtime_accounting() -> Result<()> {
    let mut dry_spec = ExecSpec::new();
    dry_spec.set_task_index(WfTaskIndex::autoparal(Stage::Ioncell));
    let mut dry = Firework::new(Vec::new(), &dry_spec);
    dry.record_launch(Launch::completed("/tmp/dry", 10.0));

    let mut production_spec = ExecSpec::new();
    production_spec.set_task_index(WfTaskIndex::numbered(Stage::Ioncell, 1));
    production_spec.set_mpi_ncpus(4);
    let mut production = Firework::new(Vec::new(), &production_spec);
    production.record_launch(Launch::completed("/tmp/run", 20.0));

    let (dry_id, production_id) = (dry.fw_id, production.fw_id);
    let wf = Workflow::new(vec![dry, production], vec![(dry_id, production_id)])?
        .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Relax));

    assert_eq!(RelaxWorkflow::get_runtime_secs(&wf)?, 90.0);
    Ok(())
}

/// Elastic-tensor retrieval binds the anaddb container to its run
/// directory and returns the extended properties plus history.
#[test]
fn test_elastic_tensor_retrieval() -> Result<()> {
    let piezo = PiezoElasticWorkflow::new(
        si_input(),
        si_input(),
        si_input(),
        WorkflowOptions::default(),
    )?;
    let mut wf = piezo.workflow().clone();

    let anaddb_id = *wf.leaf_ids().first().expect("anaddb leaf");
    let rundir = tempfile::tempdir()?;
    let mut voigt = [[0.0; 6]; 6];
    for i in 0..3 {
        voigt[i][i] = 9.0;
    }
    std::fs::write(
        rundir.path().join(ELASTIC_TENSOR_FILE),
        serde_json::to_string(&ElasticTensor::new(voigt))?,
    )?;
    std::fs::write(rundir.path().join(HISTORY_FILE), r#"{"converged": true}"#)?;
    wf.get_mut(anaddb_id)
        .expect("anaddb container")
        .record_launch(Launch::completed(rundir.path(), 5.0));

    let result = PiezoElasticWorkflow::get_elastic_tensor_and_history(&mut wf)?;
    assert_eq!(result.elastic_properties["k_voigt"], json!(3.0));
    assert_eq!(result.history["converged"], json!(true));

    let all = PiezoElasticWorkflow::get_all_elastic_tensors(&mut wf)?;
    assert_eq!(all.len(), 1);
    Ok(())
}

/// Retrieval on a container that never launched is a launch error, not a
/// silent default.
#[test]
fn test_unlaunched_container_is_launch_error() -> Result<()> {
    let piezo = PiezoElasticWorkflow::new(
        si_input(),
        si_input(),
        si_input(),
        WorkflowOptions::default(),
    )?;
    let mut wf = piezo.workflow().clone();
    let err = PiezoElasticWorkflow::get_elastic_tensor_and_history(&mut wf).unwrap_err();
    assert_eq!(err.category(), "launch");
    Ok(())
}

/// Workflows round-trip through their on-disk YAML and JSON forms.
#[test]
fn test_workflow_file_round_trip() -> Result<()> {
    let mut relax = RelaxWorkflow::new(
        si_input(),
        InputSource::ready(si_input()),
        None,
        WorkflowOptions::default(),
    )?;
    relax.add_final_cleanup(None);
    let wf = relax.workflow();

    let dir = tempfile::tempdir()?;
    for file_name in ["wf.yaml", "wf.json"] {
        let path = dir.path().join(file_name);
        wf.to_file(&path)?;
        let loaded = Workflow::from_file(&path)?;
        assert_eq!(loaded.num_fireworks(), wf.num_fireworks());
        assert_eq!(loaded.kind(), Some(WorkflowKind::Relax));
        assert_eq!(loaded.leaf_ids(), wf.leaf_ids());
    }
    Ok(())
}
