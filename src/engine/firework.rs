//! Execution containers and workflow graphs
//!
//! A `Firework` groups one or more tasks under a single execution
//! specification; a `Workflow` owns a set of fireworks plus the acyclic
//! precedence relation between them. Graphs are built once in memory,
//! submitted to the launchpad, and afterwards only grow launch records
//! (or gain an appended terminal container).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use petgraph::algo::{connected_components, is_cyclic_directed};
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::errors::{FireflowError, Result};
use crate::engine::spec::ExecSpec;
use crate::tasks::Task;

/// Container identity. Negative ids are local handles assigned at
/// construction; the launchpad reassigns positive ids at submission.
pub type FwId = i64;

static NEXT_LOCAL_ID: AtomicI64 = AtomicI64::new(-1);

fn next_local_id() -> FwId {
    NEXT_LOCAL_ID.fetch_sub(1, Ordering::Relaxed)
}

/// State of one launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    Running,
    Completed,
    Fizzled,
}

/// One launch attempt of a container, recorded by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Launch {
    pub launch_dir: PathBuf,
    pub state: LaunchState,
    pub runtime_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_end: Option<DateTime<Utc>>,
}

impl Launch {
    /// A completed launch with the given run directory and runtime.
    pub fn completed<P: Into<PathBuf>>(launch_dir: P, runtime_secs: f64) -> Self {
        Self {
            launch_dir: launch_dir.into(),
            state: LaunchState::Completed,
            runtime_secs,
            time_start: None,
            time_end: None,
        }
    }

    pub fn with_times(
        mut self,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Self {
        self.time_start = Some(time_start);
        self.time_end = Some(time_end);
        self
    }
}

/// One execution container: tasks sharing an execution specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Firework {
    pub fw_id: FwId,
    pub name: String,
    pub tasks: Vec<Task>,
    pub spec: ExecSpec,
    /// Launches of superseded attempts, oldest first
    #[serde(default)]
    pub archived_launches: Vec<Launch>,
    /// Launches of the current attempt, oldest first
    #[serde(default)]
    pub launches: Vec<Launch>,
}

impl Firework {
    /// Create a container around `tasks`, copying `spec` (value
    /// semantics: the caller's map is never aliased).
    pub fn new(tasks: Vec<Task>, spec: &ExecSpec) -> Self {
        let name = tasks
            .first()
            .map(|task| task.label().to_string())
            .unwrap_or_else(|| "unnamed_fw".to_string());
        Self {
            fw_id: next_local_id(),
            name,
            tasks,
            spec: spec.clone(),
            archived_launches: Vec::new(),
            launches: Vec::new(),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Record a launch attempt. Called by the engine side, and by tests
    /// standing in for it.
    pub fn record_launch(&mut self, launch: Launch) {
        self.launches.push(launch);
    }

    /// Most recent launch across archived and active attempts,
    /// chronological order.
    pub fn most_recent_launch(&self) -> Option<&Launch> {
        self.archived_launches.iter().chain(self.launches.iter()).last()
    }

    /// Most recent launch of the current attempt.
    pub fn last_launch(&self) -> Option<&Launch> {
        self.launches.last()
    }
}

/// Which builder family produced a workflow. Stored as typed metadata and
/// checked when result retrieval is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Input,
    Scf,
    Relax,
    Nscf,
    HybridOneShot,
    Phonon,
    PiezoElastic,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Scf => "scf",
            Self::Relax => "relax",
            Self::Nscf => "nscf",
            Self::HybridOneShot => "hybrid_one_shot",
            Self::Phonon => "phonon",
            Self::PiezoElastic => "piezo_elastic",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow-level metadata: the typed builder tag plus free-form fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<WorkflowKind>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl WorkflowMetadata {
    pub fn for_kind(kind: WorkflowKind) -> Self {
        Self {
            kind: Some(kind),
            extra: BTreeMap::new(),
        }
    }

    pub fn insert<K: Into<String>, V: Serialize>(&mut self, key: K, value: V) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.extra.insert(key.into(), json_value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Merge `other` into this mapping, later entries winning, without
    /// dropping existing fields.
    pub fn extend(&mut self, other: &BTreeMap<String, Value>) {
        for (key, value) in other {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Acyclic graph of execution containers with precedence links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    fireworks: BTreeMap<FwId, Firework>,
    /// Precedence relation: container -> successors
    links: BTreeMap<FwId, Vec<FwId>>,
    pub metadata: WorkflowMetadata,
}

impl Workflow {
    /// Build a workflow from containers and (parent, child) precedence
    /// pairs. Validates acyclicity and connectivity.
    pub fn new(fireworks: Vec<Firework>, links: Vec<(FwId, FwId)>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for fw in fireworks {
            if by_id.insert(fw.fw_id, fw).is_some() {
                return Err(FireflowError::validation("duplicate container id"));
            }
        }
        let mut link_map: BTreeMap<FwId, Vec<FwId>> = BTreeMap::new();
        for (parent, child) in links {
            let children = link_map.entry(parent).or_default();
            if !children.contains(&child) {
                children.push(child);
            }
        }
        let wf = Self {
            name: "unnamed_wf".to_string(),
            fireworks: by_id,
            links: link_map,
            metadata: WorkflowMetadata::default(),
        };
        wf.validate()?;
        Ok(wf)
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_metadata(mut self, metadata: WorkflowMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn kind(&self) -> Option<WorkflowKind> {
        self.metadata.kind
    }

    pub fn num_fireworks(&self) -> usize {
        self.fireworks.len()
    }

    /// Containers in ascending id order.
    pub fn fireworks(&self) -> impl Iterator<Item = &Firework> {
        self.fireworks.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = FwId> + '_ {
        self.fireworks.keys().copied()
    }

    pub fn get(&self, fw_id: FwId) -> Option<&Firework> {
        self.fireworks.get(&fw_id)
    }

    pub fn get_mut(&mut self, fw_id: FwId) -> Option<&mut Firework> {
        self.fireworks.get_mut(&fw_id)
    }

    pub fn children_of(&self, fw_id: FwId) -> &[FwId] {
        self.links.get(&fw_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parents_of(&self, fw_id: FwId) -> Vec<FwId> {
        self.links
            .iter()
            .filter(|(_, children)| children.contains(&fw_id))
            .map(|(parent, _)| *parent)
            .collect()
    }

    /// Containers with no successors.
    pub fn leaf_ids(&self) -> Vec<FwId> {
        self.fireworks
            .keys()
            .copied()
            .filter(|id| self.children_of(*id).is_empty())
            .collect()
    }

    /// Containers with no predecessors.
    pub fn root_ids(&self) -> Vec<FwId> {
        self.fireworks
            .keys()
            .copied()
            .filter(|id| self.parents_of(*id).is_empty())
            .collect()
    }

    /// Append `fw` as the new terminal container, wiring every current
    /// leaf as a predecessor.
    pub fn append_firework(&mut self, fw: Firework) -> FwId {
        let leaves = self.leaf_ids();
        let fw_id = fw.fw_id;
        debug!(fw_id, name = %fw.name, predecessors = leaves.len(), "appending terminal container");
        self.fireworks.insert(fw_id, fw);
        for leaf in leaves {
            self.links.entry(leaf).or_default().push(fw_id);
        }
        fw_id
    }

    /// Validate graph invariants: links reference known containers, no
    /// cycles, weak connectivity.
    pub fn validate(&self) -> Result<()> {
        for (parent, children) in &self.links {
            if !self.fireworks.contains_key(parent) {
                return Err(FireflowError::validation(format!(
                    "link source {parent} is not a known container"
                )));
            }
            for child in children {
                if !self.fireworks.contains_key(child) {
                    return Err(FireflowError::validation(format!(
                        "link target {child} is not a known container"
                    )));
                }
            }
        }

        let mut graph = DiGraph::<FwId, ()>::new();
        let mut indices = BTreeMap::new();
        for id in self.fireworks.keys() {
            indices.insert(*id, graph.add_node(*id));
        }
        for (parent, children) in &self.links {
            for child in children {
                graph.add_edge(indices[parent], indices[child], ());
            }
        }
        if is_cyclic_directed(&graph) {
            return Err(FireflowError::workflow_named(
                "workflow graph contains a cycle",
                self.name.clone(),
            ));
        }
        if graph.node_count() > 1 && connected_components(&graph) != 1 {
            return Err(FireflowError::workflow_named(
                "workflow graph is not connected",
                self.name.clone(),
            ));
        }
        Ok(())
    }

    /// Rewrite container ids according to `mapping` (old -> new),
    /// updating links consistently. Used by the launchpad at submission.
    pub(crate) fn remap_ids(&mut self, mapping: &BTreeMap<FwId, FwId>) {
        let fireworks = std::mem::take(&mut self.fireworks);
        self.fireworks = fireworks
            .into_iter()
            .map(|(old_id, mut fw)| {
                let new_id = *mapping.get(&old_id).unwrap_or(&old_id);
                fw.fw_id = new_id;
                (new_id, fw)
            })
            .collect();
        let links = std::mem::take(&mut self.links);
        self.links = links
            .into_iter()
            .map(|(parent, children)| {
                let new_parent = *mapping.get(&parent).unwrap_or(&parent);
                let new_children = children
                    .into_iter()
                    .map(|child| *mapping.get(&child).unwrap_or(&child))
                    .collect();
                (new_parent, new_children)
            })
            .collect();
    }

    /// Write the graph to a JSON or YAML file, selected by extension.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, text).map_err(|e| FireflowError::io(path.display().to_string(), e))
    }

    /// Load a graph from a JSON or YAML file, selected by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FireflowError::io(path.display().to_string(), e))?;
        let wf: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            _ => serde_json::from_str(&text)?,
        };
        wf.validate()?;
        Ok(wf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bare_fw() -> Firework {
        Firework::new(Vec::new(), &ExecSpec::new())
    }

    #[test]
    fn test_local_ids_are_negative_and_unique() {
        let a = bare_fw();
        let b = bare_fw();
        assert!(a.fw_id < 0);
        assert!(b.fw_id < 0);
        assert_ne!(a.fw_id, b.fw_id);
    }

    #[test]
    fn test_chain_roots_and_leaves() {
        let a = bare_fw();
        let b = bare_fw();
        let (a_id, b_id) = (a.fw_id, b.fw_id);
        let wf = Workflow::new(vec![a, b], vec![(a_id, b_id)]).unwrap();
        assert_eq!(wf.root_ids(), vec![a_id]);
        assert_eq!(wf.leaf_ids(), vec![b_id]);
        assert_eq!(wf.children_of(a_id), &[b_id]);
        assert_eq!(wf.parents_of(b_id), vec![a_id]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = bare_fw();
        let b = bare_fw();
        let (a_id, b_id) = (a.fw_id, b.fw_id);
        let err = Workflow::new(vec![a, b], vec![(a_id, b_id), (b_id, a_id)]).unwrap_err();
        assert_eq!(err.category(), "workflow");
    }

    #[test]
    fn test_disconnected_graph_is_rejected() {
        let a = bare_fw();
        let b = bare_fw();
        let err = Workflow::new(vec![a, b], Vec::new()).unwrap_err();
        assert_eq!(err.category(), "workflow");
    }

    #[test]
    fn test_dangling_link_is_rejected() {
        let a = bare_fw();
        let a_id = a.fw_id;
        let err = Workflow::new(vec![a], vec![(a_id, 12345)]).unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_append_wires_all_leaves() {
        let a = bare_fw();
        let b = bare_fw();
        let c = bare_fw();
        let (a_id, b_id, c_id) = (a.fw_id, b.fw_id, c.fw_id);
        // fan-out: a -> b, a -> c
        let mut wf = Workflow::new(vec![a, b, c], vec![(a_id, b_id), (a_id, c_id)]).unwrap();
        let appended = bare_fw();
        let appended_id = wf.append_firework(appended);
        assert_eq!(wf.num_fireworks(), 4);
        let mut parents = wf.parents_of(appended_id);
        parents.sort_unstable();
        let mut expected = vec![b_id, c_id];
        expected.sort_unstable();
        assert_eq!(parents, expected);
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn test_most_recent_launch_prefers_active() {
        let mut fw = bare_fw();
        fw.archived_launches.push(Launch::completed("/tmp/a", 1.0));
        fw.record_launch(Launch::completed("/tmp/b", 2.0));
        assert_eq!(
            fw.most_recent_launch().unwrap().launch_dir,
            PathBuf::from("/tmp/b")
        );
    }

    #[test]
    fn test_metadata_merge_keeps_both_sides() {
        let mut metadata = WorkflowMetadata::for_kind(WorkflowKind::Relax);
        metadata.insert("nsites", 2);
        let mut extra = BTreeMap::new();
        extra.insert("project".to_string(), Value::from("screening"));
        metadata.extend(&extra);
        assert_eq!(metadata.get("nsites"), Some(&Value::from(2)));
        assert_eq!(metadata.get("project"), Some(&Value::from("screening")));
        assert_eq!(metadata.kind, Some(WorkflowKind::Relax));
    }
}
