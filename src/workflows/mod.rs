pub mod builders;
pub mod retrieval;

pub use builders::{
    FwWorkflow, HybridOneShotWorkflow, InputWorkflow, NscfWorkflow, PhononWorkflow,
    PiezoElasticWorkflow, RelaxWorkflow, ScfWorkflow, WorkflowOptions,
};
pub use retrieval::{
    all_elastic_tensors, elastic_tensor_and_history, expect_kind, final_structure_and_history,
    retrieve_final_structure, runtime_secs, ElasticAndHistory, StructureAndHistory,
};
