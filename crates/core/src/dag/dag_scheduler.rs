use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::dag_model::{DagStatus, NodeHandle};
use super::dag_traits::Action;
use crate::bus::{Backoff, Bus};
use crate::errors::{Error, Result};
use crate::runtime::CancelToken;

struct DagNode<P> {
    action: Arc<dyn Action<P>>,
    retry: bool,
    inputs_remaining: usize,
    children: Vec<usize>,
}

struct DagState<P> {
    status: DagStatus,
    nodes: Vec<DagNode<P>>,
    params: Option<P>,
}

/// How a node task ended.
enum NodeOutcome {
    Completed,
    /// Failed on a domain error without retry; its subtree never runs.
    Abandoned,
    /// Not started or not retried because the Dag was cancelled.
    Skipped,
    Failed(Error),
}

/// A one-shot dependency graph of actions over shared parameters `P`.
///
/// Nodes are added while the Dag is building; [`run`](Self::run) starts every
/// node without dependencies and each further node once all its parents
/// completed. A node failing with a domain error is either retried with
/// exponential backoff or abandoned together with everything depending on
/// it. Any other error is fatal to the run.
///
/// Node tasks are spawned on the tokio runtime. Dropping the `run` future
/// detaches them: they still finish their current unit of work.
pub struct Dag<P> {
    id: Uuid,
    bus: Bus,
    backoff: Backoff,
    cancel: CancelToken,
    state: Mutex<DagState<P>>,
}

impl<P> Dag<P>
where
    P: Send + Sync + 'static,
{
    /// Creates an empty Dag. Shutting the bus down cancels it.
    pub fn new(bus: &Bus, params: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            bus: bus.clone(),
            backoff: Backoff::default(),
            cancel: bus.shutdown_token().child(),
            state: Mutex::new(DagState {
                status: DagStatus::Building,
                nodes: Vec::new(),
                params: Some(params),
            }),
        }
    }

    /// Sets the backoff used by nodes added with retry.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> DagStatus {
        self.lock_state().status
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Stops the run: pending retries end and no further node starts.
    /// Nodes already running finish their unit of work.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("Dag {} cancelled", self.id);
        }
        self.cancel.cancel();
    }

    /// Adds a node that is attempted once.
    pub fn add_node_ignore_errors<A>(&self, action: A, deps: &[NodeHandle]) -> Result<NodeHandle>
    where
        A: Action<P>,
    {
        self.add_node(Arc::new(action), false, deps)
    }

    /// Adds a node retried with backoff on domain errors.
    pub fn add_node_with_retry<A>(&self, action: A, deps: &[NodeHandle]) -> Result<NodeHandle>
    where
        A: Action<P>,
    {
        self.add_node(Arc::new(action), true, deps)
    }

    fn add_node(
        &self,
        action: Arc<dyn Action<P>>,
        retry: bool,
        deps: &[NodeHandle],
    ) -> Result<NodeHandle> {
        let mut state = self.lock_state();
        if state.status != DagStatus::Building {
            return Err(Error::service(format!(
                "can't add {} to dag {}: already started",
                action.name(),
                self.id
            )));
        }
        for dep in deps {
            if dep.dag_id() != self.id {
                return Err(Error::service(format!(
                    "dependency of {} belongs to dag {}, not {}",
                    action.name(),
                    dep.dag_id(),
                    self.id
                )));
            }
            if dep.node_id() >= state.nodes.len() {
                return Err(Error::service(format!(
                    "dependency of {} references unknown node {} of dag {}",
                    action.name(),
                    dep.node_id(),
                    self.id
                )));
            }
        }

        let node_id = state.nodes.len();
        for dep in deps {
            state.nodes[dep.node_id()].children.push(node_id);
        }
        debug!(
            "Dag {}: node {} is {} with {} dependenc(ies)",
            self.id,
            node_id,
            action.name(),
            deps.len()
        );
        state.nodes.push(DagNode {
            action,
            retry,
            inputs_remaining: deps.len(),
            children: Vec::new(),
        });
        Ok(NodeHandle::new(self.id, node_id))
    }

    /// Runs the Dag to completion and returns the parameters.
    ///
    /// Returns [`Error::Cancelled`] when cancelled and the first fatal error
    /// when a node failed with a non-domain error or panicked. Domain errors
    /// never surface here.
    pub async fn run(&self) -> Result<P> {
        let (mut nodes, params) = {
            let mut state = self.lock_state();
            if state.status != DagStatus::Building {
                return Err(Error::service(format!("dag {} already started", self.id)));
            }
            let params = state
                .params
                .take()
                .ok_or_else(|| Error::service(format!("dag {} has no parameters", self.id)))?;
            state.status = DagStatus::Running;
            (std::mem::take(&mut state.nodes), Arc::new(params))
        };
        info!("Dag {} started with {} node(s)", self.id, nodes.len());

        let mut running: FuturesUnordered<JoinHandle<(usize, NodeOutcome)>> =
            FuturesUnordered::new();
        for node_id in 0..nodes.len() {
            if nodes[node_id].inputs_remaining == 0 {
                running.push(self.spawn_node(node_id, &nodes[node_id], &params));
            }
        }

        let mut fatal: Option<Error> = None;
        while let Some(joined) = running.next().await {
            let (node_id, outcome) = match joined {
                Ok(finished) => finished,
                Err(join_err) => {
                    error!("Dag {}: node task panicked: {}", self.id, join_err);
                    fatal.get_or_insert_with(|| {
                        Error::service(format!("dag {} node panicked: {}", self.id, join_err))
                    });
                    self.cancel();
                    continue;
                }
            };

            match outcome {
                NodeOutcome::Completed => {
                    let children = std::mem::take(&mut nodes[node_id].children);
                    for child in children {
                        let node = &mut nodes[child];
                        node.inputs_remaining = node.inputs_remaining.saturating_sub(1);
                        if node.inputs_remaining == 0 && !self.cancel.is_cancelled() {
                            running.push(self.spawn_node(child, &nodes[child], &params));
                        }
                    }
                }
                NodeOutcome::Abandoned | NodeOutcome::Skipped => {}
                NodeOutcome::Failed(err) => {
                    error!(
                        "Dag {}: {} failed with a fatal error: {}",
                        self.id,
                        nodes[node_id].action.name(),
                        err
                    );
                    fatal.get_or_insert(err);
                    self.cancel();
                }
            }
        }

        let cancelled = self.cancel.is_cancelled();
        self.lock_state().status = if cancelled {
            DagStatus::Cancelled
        } else {
            DagStatus::Completed
        };

        if let Some(err) = fatal {
            return Err(err);
        }
        if cancelled {
            info!("Dag {} stopped before completion", self.id);
            return Err(Error::Cancelled);
        }
        info!("Dag {} completed", self.id);
        Arc::try_unwrap(params)
            .map_err(|_| Error::service(format!("dag {} parameters are still shared", self.id)))
    }

    fn spawn_node(
        &self,
        node_id: usize,
        node: &DagNode<P>,
        params: &Arc<P>,
    ) -> JoinHandle<(usize, NodeOutcome)> {
        let task = NodeTask {
            dag_id: self.id,
            bus: self.bus.clone(),
            backoff: self.backoff,
            cancel: self.cancel.clone(),
            action: Arc::clone(&node.action),
            retry: node.retry,
        };
        let params = Arc::clone(params);
        tokio::spawn(async move { (node_id, task.run(&params).await) })
    }

    fn lock_state(&self) -> MutexGuard<'_, DagState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything one node needs once detached from the Dag.
struct NodeTask<P> {
    dag_id: Uuid,
    bus: Bus,
    backoff: Backoff,
    cancel: CancelToken,
    action: Arc<dyn Action<P>>,
    retry: bool,
}

impl<P> NodeTask<P>
where
    P: Send + Sync + 'static,
{
    async fn run(&self, params: &P) -> NodeOutcome {
        let name = self.action.name();
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                debug!("Dag {}: {} skipped", self.dag_id, name);
                return NodeOutcome::Skipped;
            }

            let ctx = self.bus.uow();
            let outcome = match self.action.run(&ctx, params).await {
                Ok(()) => ctx.commit().await,
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(()) => {
                    debug!("Dag {}: {} completed", self.dag_id, name);
                    return NodeOutcome::Completed;
                }
                Err(Error::Cancelled) => return NodeOutcome::Skipped,
                Err(err) if err.is_domain() => err,
                Err(err) => return NodeOutcome::Failed(err),
            };

            failures = failures.saturating_add(1);
            if !self.retry {
                warn!(
                    "Dag {}: {} failed, dependents abandoned: {}",
                    self.dag_id, name, err
                );
                return NodeOutcome::Abandoned;
            }

            let delay = self.backoff.delay(failures);
            warn!(
                "Dag {}: {} failed {} time(s), retrying in {:?}: {}",
                self.dag_id, name, failures, delay, err
            );
            if !self.cancel.sleep(delay).await {
                return NodeOutcome::Skipped;
            }
        }
    }
}
