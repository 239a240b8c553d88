pub mod firework;
pub mod launchpad;
pub mod spec;

pub use firework::{
    Firework, FwId, Launch, LaunchState, Workflow, WorkflowKind, WorkflowMetadata,
};
pub use launchpad::{LaunchPad, WfId};
pub use spec::{
    short_single_core_spec, ExecSpec, QueueAdapterSpec, Sequence, Stage, WfTaskIndex,
    KEY_DB_CONFIG, KEY_DDB_TASK_TYPES, KEY_INITIALIZATION_INFO, KEY_MPI_NCPUS, KEY_PRIORITY,
    KEY_QUEUE_ADAPTER, KEY_TASK_INDEX,
};
