//! Workflow builders
//!
//! One builder per scientific recipe. Each builder instantiates the task
//! wrappers with the right calculation inputs, derives per-container
//! execution specifications, wires the precedence chain, and tags the
//! graph with its typed kind so result retrieval can be dispatched safely
//! later. Construction is pure in-memory graph assembly: no I/O, no
//! submission.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::errors::{FireflowError, Result};
use crate::engine::firework::{Firework, FwId, Workflow, WorkflowKind, WorkflowMetadata};
use crate::engine::launchpad::{LaunchPad, WfId};
use crate::engine::spec::{
    short_single_core_spec, ExecSpec, Stage, WfTaskIndex, KEY_DB_CONFIG, KEY_DDB_TASK_TYPES,
    KEY_INITIALIZATION_INFO,
};
use crate::inputs::factories::{
    ion_ioncell_relax_input, scf_input, GroundStateParams, HybridOneShotFromGsFactory,
    InputFactorySpec, InputSource, IoncellRelaxFromGsFactory, PhononsFromGsFactory, ScfFactory,
    ScfForPhononsFactory,
};
use crate::inputs::input::{apply_decorators, CalcInput, InputDecorator};
use crate::inputs::structure::Structure;
use crate::tasks::{
    AnaddbInput, AnaddbTask, DbConfig, DbInsertTask, FinalCleanupTask, MergeDdbTask,
    OutputCategory, PhononFlowGenTask, SimTask, Task, TaskType,
};

/// Options shared by every builder.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Run a parallelism dry run before the production calculation
    pub autoparal: bool,
    /// Caller-supplied execution-specification override
    pub spec: Option<ExecSpec>,
    /// Mapping injected into every stage container's spec
    pub initialization_info: BTreeMap<String, Value>,
}

impl WorkflowOptions {
    pub fn with_autoparal(mut self, autoparal: bool) -> Self {
        self.autoparal = autoparal;
        self
    }

    pub fn with_spec(mut self, spec: ExecSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_initialization_info(mut self, info: BTreeMap<String, Value>) -> Self {
        self.initialization_info = info;
        self
    }
}

/// Base spec for stage containers: caller override, then
/// `initialization_info`, then the autoparal downgrade when requested.
fn base_spec(opts: &WorkflowOptions) -> ExecSpec {
    let mut spec = opts.spec.clone().unwrap_or_default();
    spec.set_initialization_info(&opts.initialization_info);
    if opts.autoparal {
        spec = short_single_core_spec(Some(&spec));
    }
    spec
}

/// First index of a stage: the autoparal sentinel on a dry run, 1 on a
/// production run.
fn stage_index(opts: &WorkflowOptions, stage: Stage) -> WfTaskIndex {
    if opts.autoparal {
        WfTaskIndex::autoparal(stage)
    } else {
        WfTaskIndex::numbered(stage, 1)
    }
}

/// Char-boundary-safe truncation for container names.
fn truncate_name(name: &str, max_chars: usize) -> String {
    name.chars().take(max_chars).collect()
}

/// Best-effort reduced formula from an input source.
fn reduced_formula_of(input: &InputSource) -> String {
    match input.structure() {
        Some(structure) => structure.reduced_formula(),
        None => {
            warn!("couldn't get the structure from the input");
            String::new()
        }
    }
}

/// Operations shared by every workflow builder.
pub trait FwWorkflow {
    fn workflow(&self) -> &Workflow;
    fn workflow_mut(&mut self) -> &mut Workflow;

    /// Submit the graph to the engine.
    fn add_to_db(&self, lpad: &mut LaunchPad) -> Result<WfId> {
        lpad.add_workflow(self.workflow().clone())
    }

    /// Append a container after all current terminal containers,
    /// optionally downgrading its spec to the short single-core profile.
    fn append_fw(&mut self, mut fw: Firework, short_single_spec: bool) -> FwId {
        if short_single_spec {
            fw.spec = short_single_core_spec(Some(&fw.spec));
        }
        self.workflow_mut().append_firework(fw)
    }

    /// Short single-core spec for appended utility containers, carrying
    /// the same `initialization_info` as the stage containers.
    fn utility_spec(&self) -> ExecSpec {
        let mut spec = short_single_core_spec(None);
        if let Some(info) = self
            .workflow()
            .fireworks()
            .find_map(|fw| fw.spec.initialization_info())
        {
            spec.insert(KEY_INITIALIZATION_INFO, info);
        }
        spec
    }

    /// Append a high-priority terminal container deleting the given bulky
    /// output categories (default: wavefunction files).
    fn add_final_cleanup(&mut self, out_exts: Option<Vec<OutputCategory>>) -> FwId {
        let task = match out_exts {
            Some(exts) => FinalCleanupTask::new(exts),
            None => FinalCleanupTask::default(),
        };
        let mut spec = self.utility_spec();
        spec.set_priority(100);
        let name = truncate_name(&format!("{}_cleanup", self.workflow().name), 15);
        let fw = Firework::new(vec![Task::FinalCleanup(task)], &spec).with_name(name);
        self.workflow_mut().append_firework(fw)
    }

    /// Append a terminal container that extracts and persists results,
    /// then cleans up.
    fn add_db_insert_and_cleanup(
        &mut self,
        db_config: DbConfig,
        out_exts: Option<Vec<OutputCategory>>,
        insertion_data: Option<BTreeMap<String, String>>,
        criteria: Option<Value>,
    ) -> FwId {
        let cleanup = match out_exts {
            Some(exts) => FinalCleanupTask::new(exts),
            None => FinalCleanupTask::default(),
        };
        let insert = match insertion_data {
            Some(data) => DbInsertTask::new(data, criteria),
            None => DbInsertTask {
                criteria,
                ..DbInsertTask::default()
            },
        };
        let mut spec = self.utility_spec();
        spec.insert(KEY_DB_CONFIG, &db_config);
        let name = truncate_name(&format!("{}_insclnup", self.workflow().name), 15);
        let fw = Firework::new(
            vec![Task::DbInsert(insert), Task::FinalCleanup(cleanup)],
            &spec,
        )
        .with_name(name);
        self.workflow_mut().append_firework(fw)
    }

    /// Append a response-function analysis container derived from the
    /// structure's symmetry.
    fn add_anaddb_task(&mut self, structure: &Structure) -> FwId {
        let spec = self.utility_spec();
        let task = AnaddbTask::new(AnaddbInput::piezo_elastic(structure));
        let fw = Firework::new(vec![Task::Anaddb(task)], &spec).with_name("anaddb");
        self.workflow_mut().append_firework(fw)
    }

    /// Append a derivative-database merge container collecting the DDB
    /// outputs of the ground-state and perturbation stages.
    fn add_mrgddb_task(&mut self) -> FwId {
        let mut spec = self.utility_spec();
        spec.insert(
            KEY_DDB_TASK_TYPES,
            vec![TaskType::Scf, TaskType::StrainPert],
        );
        let fw =
            Firework::new(vec![Task::MergeDdb(MergeDdbTask::default())], &spec).with_name("mrgddb");
        self.workflow_mut().append_firework(fw)
    }

    /// Merge a structural summary and caller extras into the graph
    /// metadata without dropping either side.
    fn add_metadata(
        &mut self,
        structure: Option<&Structure>,
        additional_metadata: Option<BTreeMap<String, Value>>,
    ) {
        let wf = self.workflow_mut();
        if let Some(structure) = structure {
            wf.metadata.insert("nsites", structure.num_sites());
            wf.metadata.insert("elements", structure.elements());
            wf.metadata.insert("reduced_formula", structure.reduced_formula());
        }
        if let Some(additional) = additional_metadata {
            wf.metadata.extend(&additional);
        }
    }
}

macro_rules! impl_fw_workflow {
    ($builder:ty) => {
        impl FwWorkflow for $builder {
            fn workflow(&self) -> &Workflow {
                &self.wf
            }

            fn workflow_mut(&mut self) -> &mut Workflow {
                &mut self.wf
            }
        }
    };
}

/// Single generic calculation.
#[derive(Debug)]
pub struct InputWorkflow {
    wf: Workflow,
    pub fw: FwId,
}

impl_fw_workflow!(InputWorkflow);

impl InputWorkflow {
    pub fn new(input: CalcInput, task_type: TaskType, opts: WorkflowOptions) -> Result<Self> {
        let spec = base_spec(&opts);
        let task = SimTask::new(task_type, InputSource::ready(input)).with_autoparal(opts.autoparal);
        let fw = Firework::new(vec![Task::Sim(task)], &spec);
        let fw_id = fw.fw_id;
        let wf = Workflow::new(vec![fw], Vec::new())?
            .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Input));
        Ok(Self { wf, fw: fw_id })
    }
}

/// Single self-consistent-field calculation.
#[derive(Debug)]
pub struct ScfWorkflow {
    wf: Workflow,
    pub scf_fw: FwId,
}

impl_fw_workflow!(ScfWorkflow);

impl ScfWorkflow {
    pub fn new(scf_input: CalcInput, opts: WorkflowOptions) -> Result<Self> {
        let mut spec = base_spec(&opts);
        spec.set_task_index(stage_index(&opts, Stage::Scf));
        let task =
            SimTask::new(TaskType::Scf, InputSource::ready(scf_input)).with_autoparal(opts.autoparal);
        let fw = Firework::new(vec![Task::Sim(task)], &spec);
        let fw_id = fw.fw_id;
        let wf = Workflow::new(vec![fw], Vec::new())?
            .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Scf));
        Ok(Self { wf, scf_fw: fw_id })
    }

    /// Generate the SCF input from physical parameters, apply extra
    /// variables and decorators in order, then build.
    pub fn from_factory(
        params: &GroundStateParams,
        extra_vars: BTreeMap<String, Value>,
        decorators: Vec<Box<dyn InputDecorator>>,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let mut input = scf_input(params);
        input.set_vars(&extra_vars);
        let input = apply_decorators(input, &decorators);
        Self::new(input, opts)
    }
}

/// Ionic relaxation followed by coupled ion+cell relaxation.
#[derive(Debug)]
pub struct RelaxWorkflow {
    wf: Workflow,
    pub ion_fw: FwId,
    pub ioncell_fw: FwId,
}

impl_fw_workflow!(RelaxWorkflow);

impl RelaxWorkflow {
    pub fn new(
        ion_input: CalcInput,
        ioncell_input: InputSource,
        target_dilatmx: Option<f64>,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let mut spec = base_spec(&opts);

        let ion_index = stage_index(&opts, Stage::Ion);
        spec.set_task_index(ion_index);
        let ion_task =
            SimTask::new(TaskType::Relax, InputSource::ready(ion_input)).with_autoparal(opts.autoparal);
        let ion_fw = Firework::new(vec![Task::Sim(ion_task)], &spec).with_name(ion_index.to_string());

        let ioncell_index = stage_index(&opts, Stage::Ioncell);
        spec.set_task_index(ioncell_index);
        let mut ioncell_task =
            SimTask::new(TaskType::Relax, ioncell_input).with_autoparal(opts.autoparal);
        if let Some(target) = target_dilatmx {
            ioncell_task = ioncell_task.with_target_dilatmx(target);
        }
        let ioncell_fw =
            Firework::new(vec![Task::Sim(ioncell_task)], &spec).with_name(ioncell_index.to_string());

        let (ion_id, ioncell_id) = (ion_fw.fw_id, ioncell_fw.fw_id);
        let wf = Workflow::new(vec![ion_fw, ioncell_fw], vec![(ion_id, ioncell_id)])?
            .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Relax));
        debug!(ion_id, ioncell_id, "relax workflow assembled");
        Ok(Self {
            wf,
            ion_fw: ion_id,
            ioncell_fw: ioncell_id,
        })
    }

    /// Generate the ion-relaxation input eagerly and defer the ion+cell
    /// input to a factory resolved against the completed ion stage.
    pub fn from_factory(
        params: &GroundStateParams,
        extra_vars: BTreeMap<String, Value>,
        decorators: Vec<Box<dyn InputDecorator>>,
        target_dilatmx: Option<f64>,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let (mut ion_input, _) = ion_ioncell_relax_input(params);
        ion_input.set_vars(&extra_vars);
        let ion_input = apply_decorators(ion_input, &decorators);

        let ioncell_factory = IoncellRelaxFromGsFactory {
            accuracy: params.accuracy.clone(),
            extra_vars,
            decorators,
        };
        Self::new(
            ion_input,
            InputSource::deferred(InputFactorySpec::IoncellRelaxFromGs(ioncell_factory)),
            target_dilatmx,
            opts,
        )
    }
}

/// SCF followed by a non-self-consistent band-structure step.
#[derive(Debug)]
pub struct NscfWorkflow {
    wf: Workflow,
    pub scf_fw: FwId,
    pub nscf_fw: FwId,
}

impl_fw_workflow!(NscfWorkflow);

impl NscfWorkflow {
    pub fn new(scf_input: CalcInput, nscf_input: CalcInput, opts: WorkflowOptions) -> Result<Self> {
        let mut spec = base_spec(&opts);

        spec.set_task_index(stage_index(&opts, Stage::Scf));
        let scf_task =
            SimTask::new(TaskType::Scf, InputSource::ready(scf_input)).with_autoparal(opts.autoparal);
        let scf_fw = Firework::new(vec![Task::Sim(scf_task)], &spec);

        // the non-SCF step reads the converged density of the SCF step
        spec.set_task_index(stage_index(&opts, Stage::Nscf));
        let nscf_task = SimTask::new(TaskType::Nscf, InputSource::ready(nscf_input))
            .with_dep(TaskType::Scf, OutputCategory::Den)
            .with_autoparal(opts.autoparal);
        let nscf_fw = Firework::new(vec![Task::Sim(nscf_task)], &spec);

        let (scf_id, nscf_id) = (scf_fw.fw_id, nscf_fw.fw_id);
        let wf = Workflow::new(vec![scf_fw, nscf_fw], vec![(scf_id, nscf_id)])?
            .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Nscf));
        Ok(Self {
            wf,
            scf_fw: scf_id,
            nscf_fw: nscf_id,
        })
    }
}

/// SCF followed by a one-shot hybrid-functional calculation.
#[derive(Debug)]
pub struct HybridOneShotWorkflow {
    wf: Workflow,
    pub scf_fw: FwId,
    pub hybrid_fw: FwId,
}

impl_fw_workflow!(HybridOneShotWorkflow);

impl HybridOneShotWorkflow {
    pub fn new(
        scf_input: InputSource,
        hybrid_input: InputSource,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let rf = reduced_formula_of(&scf_input);
        let mut spec = base_spec(&opts);

        spec.set_task_index(stage_index(&opts, Stage::Scf));
        let scf_task = SimTask::new(TaskType::Scf, scf_input).with_autoparal(opts.autoparal);
        let scf_name = format!("{}_{}", rf, scf_task.task_type());
        let scf_fw = Firework::new(vec![Task::Sim(scf_task)], &spec).with_name(scf_name);

        // the hybrid step starts from the SCF wavefunctions
        spec.set_task_index(stage_index(&opts, Stage::Hybrid));
        let hybrid_task = SimTask::new(TaskType::Hybrid, hybrid_input)
            .with_dep(TaskType::Scf, OutputCategory::Wfk)
            .with_autoparal(opts.autoparal);
        let hybrid_name = format!("{}_{}", rf, hybrid_task.task_type());
        let hybrid_fw = Firework::new(vec![Task::Sim(hybrid_task)], &spec).with_name(hybrid_name);

        let (scf_id, hybrid_id) = (scf_fw.fw_id, hybrid_fw.fw_id);
        let wf = Workflow::new(vec![scf_fw, hybrid_fw], vec![(scf_id, hybrid_id)])?
            .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::HybridOneShot));
        Ok(Self {
            wf,
            scf_fw: scf_id,
            hybrid_fw: hybrid_id,
        })
    }

    /// Defer both stages to factories; the hybrid factory resolves
    /// against the completed ground-state run.
    pub fn from_factory(
        params: GroundStateParams,
        functional: &str,
        ecutsigx: Option<f64>,
        gw_qprange: i32,
        extra_vars: BTreeMap<String, Value>,
        decorators: Vec<Box<dyn InputDecorator>>,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let scf_factory = ScfFactory {
            params,
            extra_vars: extra_vars.clone(),
            decorators: decorators.clone(),
        };
        let hybrid_factory = HybridOneShotFromGsFactory {
            functional: functional.to_string(),
            ecutsigx,
            gw_qprange,
            extra_vars,
            decorators,
        };
        Self::new(
            InputSource::deferred(InputFactorySpec::Scf(scf_factory)),
            InputSource::deferred(InputFactorySpec::HybridOneShotFromGs(hybrid_factory)),
            opts,
        )
    }
}

/// SCF followed by generation of the full phonon perturbation flow.
#[derive(Debug)]
pub struct PhononWorkflow {
    wf: Workflow,
    pub scf_fw: FwId,
    pub ph_generation_fw: FwId,
}

impl_fw_workflow!(PhononWorkflow);

impl PhononWorkflow {
    pub fn new(
        scf_input: InputSource,
        phonon_factory: PhononsFromGsFactory,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let rf = reduced_formula_of(&scf_input);
        let mut spec = base_spec(&opts);

        spec.set_task_index(stage_index(&opts, Stage::Scf));
        let scf_task = SimTask::new(TaskType::Scf, scf_input).with_autoparal(opts.autoparal);
        let scf_name = format!("{}_{}", rf, scf_task.task_type());
        let scf_fw = Firework::new(vec![Task::Sim(scf_task)], &spec).with_name(scf_name);

        let generation_task = PhononFlowGenTask::new(phonon_factory, TaskType::Scf)
            .with_autoparal(opts.autoparal);
        spec.set_task_index(WfTaskIndex::unnumbered(Stage::GenPh));
        let generation_fw = Firework::new(vec![Task::PhononFlowGen(generation_task)], &spec)
            .with_name(format!("{}_gen_ph", rf));

        let (scf_id, generation_id) = (scf_fw.fw_id, generation_fw.fw_id);
        let wf = Workflow::new(vec![scf_fw, generation_fw], vec![(scf_id, generation_id)])?
            .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::Phonon));
        Ok(Self {
            wf,
            scf_fw: scf_id,
            ph_generation_fw: generation_id,
        })
    }

    /// Build the SCF stage from a phonon-tightened factory and carry the
    /// phonon factory through to the generation task.
    pub fn from_factory(
        params: GroundStateParams,
        phonon_factory: PhononsFromGsFactory,
        scf_tol: Option<f64>,
        extra_vars: BTreeMap<String, Value>,
        decorators: Vec<Box<dyn InputDecorator>>,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let mut scf_extra = extra_vars;
        scf_extra.insert(
            "tolwfr".to_string(),
            Value::from(scf_tol.unwrap_or(1e-22)),
        );
        let scf_factory = ScfForPhononsFactory {
            params,
            extra_vars: scf_extra,
            decorators,
        };
        Self::new(
            InputSource::deferred(InputFactorySpec::ScfForPhonons(scf_factory)),
            phonon_factory,
            opts,
        )
    }
}

/// SCF, d/dk perturbation, then strain perturbation, with an automatic
/// anaddb analysis container at the end.
#[derive(Debug)]
pub struct PiezoElasticWorkflow {
    wf: Workflow,
    pub scf_fw: FwId,
    pub ddk_fw: FwId,
    pub rf_fw: FwId,
}

impl_fw_workflow!(PiezoElasticWorkflow);

impl PiezoElasticWorkflow {
    pub fn new(
        scf_input: CalcInput,
        ddk_input: CalcInput,
        rf_input: CalcInput,
        opts: WorkflowOptions,
    ) -> Result<Self> {
        let structure = scf_input.structure.clone();
        let scf_source = InputSource::ready(scf_input);
        let rf = reduced_formula_of(&scf_source);
        let mut spec = base_spec(&opts);

        spec.set_task_index(stage_index(&opts, Stage::Scf));
        let scf_task = SimTask::new(TaskType::Scf, scf_source).with_autoparal(opts.autoparal);
        let scf_name = format!("{}_{}", rf, scf_task.task_type());
        let scf_fw = Firework::new(vec![Task::Sim(scf_task)], &spec).with_name(scf_name);

        spec.set_task_index(stage_index(&opts, Stage::Ddk));
        let ddk_task = SimTask::new(TaskType::Ddk, InputSource::ready(ddk_input))
            .with_dep(TaskType::Scf, OutputCategory::Wfk)
            .with_autoparal(opts.autoparal);
        let ddk_name = truncate_name(&format!("{}{}", rf, ddk_task.task_type()), 8);
        let ddk_fw = Firework::new(vec![Task::Sim(ddk_task)], &spec).with_name(ddk_name);

        spec.set_task_index(stage_index(&opts, Stage::StrainPert));
        let strain_task = SimTask::new(TaskType::StrainPert, InputSource::ready(rf_input))
            .with_dep(TaskType::Scf, OutputCategory::Wfk)
            .with_dep(TaskType::Ddk, OutputCategory::Ddk)
            .with_autoparal(opts.autoparal);
        let strain_name = truncate_name(&format!("{}{}", rf, strain_task.task_type()), 8);
        let strain_fw = Firework::new(vec![Task::Sim(strain_task)], &spec).with_name(strain_name);

        let (scf_id, ddk_id, strain_id) = (scf_fw.fw_id, ddk_fw.fw_id, strain_fw.fw_id);
        let wf = Workflow::new(
            vec![scf_fw, ddk_fw, strain_fw],
            vec![(scf_id, ddk_id), (ddk_id, strain_id)],
        )?
        .with_metadata(WorkflowMetadata::for_kind(WorkflowKind::PiezoElastic));

        let mut built = Self {
            wf,
            scf_fw: scf_id,
            ddk_fw: ddk_id,
            rf_fw: strain_id,
        };
        built.add_anaddb_task(&structure);
        Ok(built)
    }

    pub fn from_factory() -> Result<Self> {
        Err(FireflowError::not_implemented(
            "factory construction for the piezo-elastic workflow",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spec::Sequence;
    use pretty_assertions::assert_eq;

    fn si_structure() -> Structure {
        Structure::from_sites(
            [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
            vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
        )
    }

    fn si_input() -> CalcInput {
        CalcInput::new(si_structure())
    }

    #[test]
    fn test_scf_workflow_is_tagged() {
        let scf = ScfWorkflow::new(si_input(), WorkflowOptions::default()).unwrap();
        assert_eq!(scf.workflow().kind(), Some(WorkflowKind::Scf));
        let fw = scf.workflow().get(scf.scf_fw).unwrap();
        let index = fw.spec.task_index().unwrap();
        assert_eq!(index.stage, Stage::Scf);
        assert_eq!(index.seq, Some(Sequence::Number(1)));
    }

    #[test]
    fn test_input_workflow_single_container() {
        let single = InputWorkflow::new(si_input(), TaskType::Scf, WorkflowOptions::default())
            .unwrap();
        let wf = single.workflow();
        assert_eq!(wf.num_fireworks(), 1);
        assert_eq!(wf.kind(), Some(WorkflowKind::Input));
        assert_eq!(wf.leaf_ids(), vec![single.fw]);
    }

    #[test]
    fn test_relax_chain_order() {
        let relax = RelaxWorkflow::new(
            si_input(),
            InputSource::ready(si_input()),
            None,
            WorkflowOptions::default(),
        )
        .unwrap();
        let wf = relax.workflow();
        assert_eq!(wf.children_of(relax.ion_fw), &[relax.ioncell_fw]);
        assert_eq!(wf.leaf_ids(), vec![relax.ioncell_fw]);
    }

    #[test]
    fn test_relax_dilatmx_target() {
        let relax = RelaxWorkflow::new(
            si_input(),
            InputSource::ready(si_input()),
            Some(1.01),
            WorkflowOptions::default(),
        )
        .unwrap();
        let fw = relax.workflow().get(relax.ioncell_fw).unwrap();
        let task = fw.tasks[0].as_sim().unwrap();
        assert_eq!(task.target_dilatmx, Some(1.01));
    }

    #[test]
    fn test_piezo_elastic_has_anaddb_appended() {
        let piezo = PiezoElasticWorkflow::new(
            si_input(),
            si_input(),
            si_input(),
            WorkflowOptions::default(),
        )
        .unwrap();
        let wf = piezo.workflow();
        assert_eq!(wf.num_fireworks(), 4);
        let leaves = wf.leaf_ids();
        assert_eq!(leaves.len(), 1);
        let anaddb_fw = wf.get(leaves[0]).unwrap();
        assert!(anaddb_fw.tasks[0].as_anaddb().is_some());
        assert_eq!(wf.parents_of(leaves[0]), vec![piezo.rf_fw]);
    }

    #[test]
    fn test_piezo_from_factory_unimplemented() {
        let err = PiezoElasticWorkflow::from_factory().unwrap_err();
        assert_eq!(err.category(), "not_implemented");
    }

    #[test]
    fn test_name_truncation() {
        assert_eq!(truncate_name("abcdefghij", 8), "abcdefgh");
        assert_eq!(truncate_name("short", 8), "short");
    }
}
