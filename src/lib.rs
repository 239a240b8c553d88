//! Fireflow - declarative workflow assembly for ab initio simulation runs.
//!
//! This library builds directed-acyclic task graphs ("workflows") that
//! drive an electronic-structure simulation code through an external
//! distributed task-execution engine. Each builder assembles one
//! scientific recipe into a graph of execution containers, wires the
//! data dependencies between steps, and attaches bookkeeping (metadata,
//! cleanup, database insertion). After execution, the retrieval helpers
//! walk the stored graph to recover structured results and compute-time
//! accounting.

// Core infrastructure modules
pub mod core {
    pub mod errors;
    pub mod logging;
}

// The assembly layers, in dependency order
pub mod engine; // execution-engine data model: specs, containers, graphs
pub mod inputs; // opaque calculation inputs and generation factories
pub mod tasks; // task wrappers around calculation inputs
pub mod workflows; // workflow builders and result retrieval

// Re-exports for convenience
pub use core::errors::{FireflowError, Result};
pub use core::logging::init_logging;
pub use engine::*;
pub use inputs::*;
pub use tasks::{OutputCategory, SimTask, Task, TaskType};
pub use workflows::*;
