//! Workflow submission
//!
//! The launchpad is the submission endpoint of the external engine: it
//! assigns engine ids to containers (rewriting precedence links
//! consistently) and owns the stored graphs afterwards. Scheduling,
//! queuing and retries live entirely on the engine side and are not
//! modeled here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::errors::Result;
use crate::engine::firework::{FwId, Workflow};

/// Workflow identity assigned at submission.
pub type WfId = u64;

/// In-process stand-in for the engine's submission endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct LaunchPad {
    workflows: BTreeMap<WfId, Workflow>,
    next_fw_id: FwId,
    next_wf_id: WfId,
}

impl Default for LaunchPad {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchPad {
    pub fn new() -> Self {
        Self {
            workflows: BTreeMap::new(),
            next_fw_id: 1,
            next_wf_id: 1,
        }
    }

    /// Submit a workflow: local container handles are replaced by engine
    /// ids in creation order, links are rewritten to match, and the graph
    /// is stored. Returns the workflow id.
    pub fn add_workflow(&mut self, mut wf: Workflow) -> Result<WfId> {
        wf.validate()?;

        // Local handles count down from -1, so creation order is
        // descending id order.
        let mut old_ids: Vec<FwId> = wf.ids().filter(|id| *id < 0).collect();
        old_ids.sort_unstable_by(|a, b| b.cmp(a));
        let mut mapping = BTreeMap::new();
        for old_id in old_ids {
            mapping.insert(old_id, self.next_fw_id);
            self.next_fw_id += 1;
        }
        wf.remap_ids(&mapping);
        wf.validate()?;

        let wf_id = self.next_wf_id;
        self.next_wf_id += 1;
        info!(
            wf_id,
            name = %wf.name,
            containers = wf.num_fireworks(),
            "workflow submitted"
        );
        self.workflows.insert(wf_id, wf);
        Ok(wf_id)
    }

    pub fn get_workflow(&self, wf_id: WfId) -> Option<&Workflow> {
        self.workflows.get(&wf_id)
    }

    pub fn get_workflow_mut(&mut self, wf_id: WfId) -> Option<&mut Workflow> {
        self.workflows.get_mut(&wf_id)
    }

    pub fn workflows(&self) -> impl Iterator<Item = (&WfId, &Workflow)> {
        self.workflows.iter()
    }
}
