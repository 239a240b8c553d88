//! Input-generation factories
//!
//! Thin stand-ins for the scientific input-generation library: given
//! high-level physical parameters they produce `CalcInput` objects, either
//! eagerly (ground-state recipes) or deferred behind a factory param-pack
//! that downstream tasks resolve against a completed ground-state run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::inputs::input::{apply_decorators, CalcInput, InputDecorator};
use crate::inputs::structure::Structure;

/// High-level physical parameters for a ground-state calculation.
///
/// Mirrors the keyword surface of the external factory functions; every
/// field except the structure and pseudopotentials has a conventional
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundStateParams {
    pub structure: Structure,
    /// Pseudopotential identifiers, one per element
    pub pseudos: Vec<String>,
    /// Target k-point density per reciprocal atom
    pub kppa: Option<u32>,
    /// Plane-wave cutoff in Hartree
    pub ecut: Option<f64>,
    /// PAW double-grid cutoff in Hartree
    pub pawecutdg: Option<f64>,
    pub nband: Option<u32>,
    pub accuracy: String,
    pub spin_mode: String,
    pub smearing: String,
    pub charge: f64,
    pub scf_algorithm: Option<String>,
    pub shift_mode: String,
}

impl GroundStateParams {
    pub fn new(structure: Structure, pseudos: Vec<String>) -> Self {
        Self {
            structure,
            pseudos,
            kppa: None,
            ecut: None,
            pawecutdg: None,
            nband: None,
            accuracy: "normal".to_string(),
            spin_mode: "polarized".to_string(),
            smearing: "fermi_dirac:0.1 eV".to_string(),
            charge: 0.0,
            scf_algorithm: None,
            shift_mode: "Monkhorst-Pack".to_string(),
        }
    }

    pub fn with_kppa(mut self, kppa: u32) -> Self {
        self.kppa = Some(kppa);
        self
    }

    pub fn with_ecut(mut self, ecut: f64) -> Self {
        self.ecut = Some(ecut);
        self
    }

    pub fn with_nband(mut self, nband: u32) -> Self {
        self.nband = Some(nband);
        self
    }

    pub fn with_smearing<S: Into<String>>(mut self, smearing: S) -> Self {
        self.smearing = smearing.into();
        self
    }
}

/// Base ground-state input shared by the eager factories.
fn ground_state_input(params: &GroundStateParams) -> CalcInput {
    let mut input = CalcInput::new(params.structure.clone());
    input.set_var("pseudos", params.pseudos.clone());
    input.set_var("accuracy", params.accuracy.clone());
    input.set_var("spin_mode", params.spin_mode.clone());
    input.set_var("smearing", params.smearing.clone());
    input.set_var("charge", params.charge);
    input.set_var("shift_mode", params.shift_mode.clone());
    if let Some(kppa) = params.kppa {
        input.set_var("kppa", kppa);
    }
    if let Some(ecut) = params.ecut {
        input.set_var("ecut", ecut);
    }
    if let Some(pawecutdg) = params.pawecutdg {
        input.set_var("pawecutdg", pawecutdg);
    }
    if let Some(nband) = params.nband {
        input.set_var("nband", nband);
    }
    if let Some(ref algo) = params.scf_algorithm {
        input.set_var("scf_algorithm", algo.clone());
    }
    input
}

/// Self-consistent-field input.
pub fn scf_input(params: &GroundStateParams) -> CalcInput {
    ground_state_input(params).with_var("tolvrs", 1e-10)
}

/// (ion-only, ion+cell) relaxation input pair.
///
/// The first input relaxes ionic positions at fixed cell, the second
/// relaxes positions and cell together.
pub fn ion_ioncell_relax_input(params: &GroundStateParams) -> (CalcInput, CalcInput) {
    let base = ground_state_input(params).with_var("tolmxf", 5e-5);
    let ion = base.clone().with_var("ionmov", 2).with_var("optcell", 0);
    let ioncell = base
        .with_var("ionmov", 2)
        .with_var("optcell", 1)
        .with_var("dilatmx", 1.1)
        .with_var("ecutsm", 0.5);
    (ion, ioncell)
}

/// Eager SCF factory carrying extra variables and decorators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScfFactory {
    pub params: GroundStateParams,
    pub extra_vars: BTreeMap<String, Value>,
    #[serde(skip)]
    pub decorators: Vec<Box<dyn InputDecorator>>,
}

impl ScfFactory {
    pub fn new(params: GroundStateParams) -> Self {
        Self {
            params,
            extra_vars: BTreeMap::new(),
            decorators: Vec::new(),
        }
    }

    pub fn build(&self) -> CalcInput {
        let mut input = scf_input(&self.params);
        input.set_vars(&self.extra_vars);
        apply_decorators(input, &self.decorators)
    }
}

/// SCF factory tightened for a subsequent phonon flow (wavefunction
/// convergence instead of potential convergence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScfForPhononsFactory {
    pub params: GroundStateParams,
    pub extra_vars: BTreeMap<String, Value>,
    #[serde(skip)]
    pub decorators: Vec<Box<dyn InputDecorator>>,
}

impl ScfForPhononsFactory {
    pub fn new(params: GroundStateParams) -> Self {
        Self {
            params,
            extra_vars: BTreeMap::new(),
            decorators: Vec::new(),
        }
    }

    pub fn build(&self) -> CalcInput {
        let mut input = ground_state_input(&self.params);
        if !self.extra_vars.contains_key("tolwfr") {
            input.set_var("tolwfr", 1e-22);
        }
        input.set_vars(&self.extra_vars);
        apply_decorators(input, &self.decorators)
    }
}

/// Deferred ion+cell relaxation derived from a completed ground-state run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoncellRelaxFromGsFactory {
    pub accuracy: String,
    pub extra_vars: BTreeMap<String, Value>,
    #[serde(skip)]
    pub decorators: Vec<Box<dyn InputDecorator>>,
}

impl IoncellRelaxFromGsFactory {
    pub fn new<S: Into<String>>(accuracy: S) -> Self {
        Self {
            accuracy: accuracy.into(),
            extra_vars: BTreeMap::new(),
            decorators: Vec::new(),
        }
    }

    pub fn build_from_gs(&self, gs_input: &CalcInput) -> CalcInput {
        let mut input = gs_input
            .clone()
            .with_var("accuracy", self.accuracy.clone())
            .with_var("ionmov", 2)
            .with_var("optcell", 1)
            .with_var("dilatmx", 1.1)
            .with_var("ecutsm", 0.5);
        input.set_vars(&self.extra_vars);
        apply_decorators(input, &self.decorators)
    }
}

/// Deferred one-shot hybrid-functional calculation from a ground-state run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridOneShotFromGsFactory {
    pub functional: String,
    pub ecutsigx: Option<f64>,
    pub gw_qprange: i32,
    pub extra_vars: BTreeMap<String, Value>,
    #[serde(skip)]
    pub decorators: Vec<Box<dyn InputDecorator>>,
}

impl HybridOneShotFromGsFactory {
    pub fn new<S: Into<String>>(functional: S) -> Self {
        Self {
            functional: functional.into(),
            ecutsigx: None,
            gw_qprange: 1,
            extra_vars: BTreeMap::new(),
            decorators: Vec::new(),
        }
    }

    pub fn build_from_gs(&self, gs_input: &CalcInput) -> CalcInput {
        let mut input = gs_input
            .clone()
            .with_var("functional", self.functional.clone())
            .with_var("gw_qprange", self.gw_qprange);
        if let Some(ecutsigx) = self.ecutsigx {
            input.set_var("ecutsigx", ecutsigx);
        }
        input.set_vars(&self.extra_vars);
        apply_decorators(input, &self.decorators)
    }
}

/// Parameter pack for a phonon flow derived from a ground-state run.
///
/// Expansion into individual perturbation inputs happens inside the
/// execution engine when the generation task runs; this layer only carries
/// the parameters through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhononsFromGsFactory {
    pub ph_ngqpt: Option<[u32; 3]>,
    pub with_ddk: bool,
    pub with_dde: bool,
    pub with_bec: bool,
    pub ph_tol: Option<f64>,
    pub ddk_tol: Option<f64>,
    pub dde_tol: Option<f64>,
    pub extra_vars: BTreeMap<String, Value>,
    #[serde(skip)]
    pub decorators: Vec<Box<dyn InputDecorator>>,
}

impl Default for PhononsFromGsFactory {
    fn default() -> Self {
        Self {
            ph_ngqpt: None,
            with_ddk: true,
            with_dde: true,
            with_bec: false,
            ph_tol: None,
            ddk_tol: None,
            dde_tol: None,
            extra_vars: BTreeMap::new(),
            decorators: Vec::new(),
        }
    }
}

/// Deferred factory variants a task can carry in place of a ready input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "factory", rename_all = "snake_case")]
pub enum InputFactorySpec {
    Scf(ScfFactory),
    ScfForPhonons(ScfForPhononsFactory),
    IoncellRelaxFromGs(IoncellRelaxFromGsFactory),
    HybridOneShotFromGs(HybridOneShotFromGsFactory),
    PhononsFromGs(PhononsFromGsFactory),
}

impl InputFactorySpec {
    /// The structure the factory was parameterized with, when it has one.
    pub fn structure(&self) -> Option<&Structure> {
        match self {
            Self::Scf(factory) => Some(&factory.params.structure),
            Self::ScfForPhonons(factory) => Some(&factory.params.structure),
            Self::IoncellRelaxFromGs(_)
            | Self::HybridOneShotFromGs(_)
            | Self::PhononsFromGs(_) => None,
        }
    }
}

/// The input a task wrapper carries: either a ready calculation input or a
/// factory the engine resolves at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    Ready { input: CalcInput },
    Deferred { factory: InputFactorySpec },
}

impl InputSource {
    pub fn ready(input: CalcInput) -> Self {
        Self::Ready { input }
    }

    pub fn deferred(factory: InputFactorySpec) -> Self {
        Self::Deferred { factory }
    }

    /// Best-effort structure lookup across both variants.
    pub fn structure(&self) -> Option<&Structure> {
        match self {
            Self::Ready { input } => Some(&input.structure),
            Self::Deferred { factory } => {
                let found = factory.structure();
                if found.is_none() {
                    debug!("deferred factory carries no structure");
                }
                found
            }
        }
    }
}
