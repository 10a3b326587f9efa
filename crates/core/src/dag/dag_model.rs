use uuid::Uuid;

/// Reference to a node of one particular [`Dag`](super::Dag).
///
/// Handles are only valid as dependencies within the Dag that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    dag_id: Uuid,
    node_id: usize,
}

impl NodeHandle {
    pub(super) fn new(dag_id: Uuid, node_id: usize) -> Self {
        Self { dag_id, node_id }
    }

    pub fn dag_id(&self) -> Uuid {
        self.dag_id
    }

    pub fn node_id(&self) -> usize {
        self.node_id
    }
}

/// Lifecycle of a Dag: `Building → Running → {Completed, Cancelled}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DagStatus {
    Building,
    Running,
    Completed,
    Cancelled,
}
