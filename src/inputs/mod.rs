pub mod factories;
pub mod input;
pub mod structure;

pub use factories::{
    ion_ioncell_relax_input, scf_input, GroundStateParams, HybridOneShotFromGsFactory,
    InputFactorySpec, InputSource, IoncellRelaxFromGsFactory, PhononsFromGsFactory, ScfFactory,
    ScfForPhononsFactory,
};
pub use input::{apply_decorators, CalcInput, InputDecorator};
pub use structure::{ElasticTensor, Site, Structure};
