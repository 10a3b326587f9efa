use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use log::{debug, error, info, warn};
use tokio::sync::oneshot;

use super::message::{Envelope, Message};
use super::policy::{Policy, PolicyFactory};
use crate::errors::{Error, Result};
use crate::runtime::{CancelToken, TaskScope};
use crate::store::EntityStore;
use crate::uow::UnitOfWork;
use crate::utils::short_type_name;

/// Handles one message type.
///
/// Each invocation gets a fresh [`UnitOfWork`]: entities loaded for update are
/// saved and messages published through it are released only when `handle`
/// returns `Ok`.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync + 'static {
    async fn handle(&self, ctx: &UnitOfWork, msg: &M) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

type Route = Arc<dyn Fn(Bus, Arc<dyn Any + Send + Sync>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Collects handler registrations before the bus starts.
///
/// The registration table is read-only once [`build`](Self::build) is called.
pub struct BusBuilder {
    store: EntityStore,
    routes: HashMap<TypeId, Vec<Route>>,
    shutdown: CancelToken,
}

impl BusBuilder {
    pub fn new(store: EntityStore) -> Self {
        Self {
            store,
            routes: HashMap::new(),
            shutdown: CancelToken::new(),
        }
    }

    /// Links the bus to an outer shutdown token (e.g. the process one).
    pub fn with_shutdown(mut self, parent: &CancelToken) -> Self {
        self.shutdown = parent.child();
        self
    }

    /// Registers `handler` for messages of type `M`.
    ///
    /// A handler accepting several message types is registered once per type.
    /// Handlers of one type are dispatched in registration order.
    pub fn register<M, H, P>(mut self, handler: Arc<H>, policy: P) -> Self
    where
        M: Message,
        H: Handler<M>,
        P: PolicyFactory + 'static,
    {
        info!(
            "Registered {} for {}",
            handler.name(),
            short_type_name::<M>()
        );
        let order = StartOrder::default();
        let route: Route = Arc::new(
            move |bus: Bus, payload: Arc<dyn Any + Send + Sync>| -> BoxFuture<'static, ()> {
                let handler = Arc::clone(&handler);
                let policy = policy.build();
                let (previous, started) = order.next_turn();
                Box::pin(async move {
                    if let Some(previous) = previous {
                        // Err means the previous dispatch ended before starting.
                        let _ = previous.await;
                    }
                    match payload.downcast::<M>() {
                        Ok(msg) => dispatch(bus, handler, policy, msg, started).await,
                        Err(_) => error!(
                            "Payload routed to {} is not a {}",
                            short_type_name::<H>(),
                            short_type_name::<M>()
                        ),
                    }
                })
            },
        );
        self.routes.entry(TypeId::of::<M>()).or_default().push(route);
        self
    }

    pub fn build(self) -> Bus {
        Bus {
            inner: Arc::new(BusInner {
                store: self.store,
                routes: self.routes,
                scope: TaskScope::new(),
                shutdown: self.shutdown,
                fatal: Mutex::new(None),
            }),
        }
    }
}

/// In-process message bus.
///
/// `publish` never blocks: every matching handler gets its own dispatch task,
/// tracked by the bus so [`wait`](Self::wait) can join them all. A dispatch
/// retries domain-level failures according to its policy; any other failure
/// is fatal and shuts the bus down.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    store: EntityStore,
    routes: HashMap<TypeId, Vec<Route>>,
    scope: Arc<TaskScope>,
    shutdown: CancelToken,
    fatal: Mutex<Option<Error>>,
}

impl Bus {
    pub fn builder(store: EntityStore) -> BusBuilder {
        BusBuilder::new(store)
    }

    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    /// Starts a unit of work whose messages are released to this bus.
    pub fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(self.clone())
    }

    /// Routes `msg` to every handler registered for its type.
    ///
    /// Must be called from within a tokio runtime.
    pub fn publish<M: Message>(&self, msg: M) {
        self.publish_envelope(Envelope::new(msg));
    }

    pub(crate) fn publish_envelope(&self, envelope: Envelope) {
        if self.is_shutting_down() {
            warn!(
                "Bus is shutting down, dropping {} message",
                envelope.type_name
            );
            return;
        }
        let Some(routes) = self.inner.routes.get(&envelope.type_id) else {
            debug!("No handlers registered for {}", envelope.type_name);
            return;
        };
        for route in routes {
            let task = route(self.clone(), Arc::clone(&envelope.payload));
            self.inner.scope.spawn(task);
        }
    }

    /// Stops retries and refuses new messages. Running handlers finish.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("Message bus shutting down");
        }
        self.inner.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn shutdown_token(&self) -> &CancelToken {
        &self.inner.shutdown
    }

    /// Number of dispatches still running.
    pub fn in_flight(&self) -> usize {
        self.inner.scope.active()
    }

    /// Waits for every dispatch, including the ones they publish in turn.
    ///
    /// Returns the fatal error that stopped the bus, if any.
    pub async fn wait(&self) -> Result<()> {
        self.inner.scope.wait_idle().await;
        match self.lock_fatal().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail(&self, err: Error) {
        {
            let mut fatal = self.lock_fatal();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.shutdown();
    }

    fn lock_fatal(&self) -> std::sync::MutexGuard<'_, Option<Error>> {
        self.inner
            .fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start turns of one route.
///
/// Each dispatch waits until the dispatch published before it has made its
/// first handler poll, so dispatches of one handler start in publish order
/// and then run concurrently.
#[derive(Default)]
struct StartOrder {
    last: Mutex<Option<oneshot::Receiver<()>>>,
}

impl StartOrder {
    /// Returns the turn to wait for and the signal releasing the next one.
    fn next_turn(&self) -> (Option<oneshot::Receiver<()>>, oneshot::Sender<()>) {
        let (started, turn) = oneshot::channel();
        let previous = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(turn);
        (previous, started)
    }
}

/// Runs one handler for one message until it succeeds or its policy gives up.
async fn dispatch<M, H>(
    bus: Bus,
    handler: Arc<H>,
    mut policy: Box<dyn Policy>,
    msg: Arc<M>,
    started: oneshot::Sender<()>,
) where
    M: Message,
    H: Handler<M>,
{
    let handler_name = handler.name();
    let message_name = short_type_name::<M>();
    let mut attempt: u32 = 0;
    let mut started = Some(started);

    loop {
        attempt += 1;
        let ctx = bus.uow();
        let mut handling = handler.handle(&ctx, &msg);
        let handled = future::poll_fn(|cx| {
            let poll = handling.as_mut().poll(cx);
            if let Some(started) = started.take() {
                let _ = started.send(());
            }
            poll
        })
        .await;
        drop(handling);
        let outcome = match handled {
            Ok(()) => ctx.commit().await,
            Err(err) => Err(err),
        };

        let err = match outcome {
            Ok(()) => {
                debug!(
                    "{} handled {} in {} attempt(s)",
                    handler_name, message_name, attempt
                );
                return;
            }
            Err(Error::Cancelled) => {
                info!("{} stopped handling {}: cancelled", handler_name, message_name);
                return;
            }
            Err(err) => err,
        };

        if !err.is_domain() {
            error!(
                "{} failed on {} with a fatal error: {}",
                handler_name, message_name, err
            );
            bus.fail(err);
            return;
        }

        warn!(
            "{} can't handle {} in {} attempt(s): {}",
            handler_name, message_name, attempt, err
        );

        let Some(delay) = policy.next_delay() else {
            return;
        };
        if !bus.shutdown_token().sleep(delay).await {
            info!(
                "{} retry of {} dropped on shutdown",
                handler_name, message_name
            );
            return;
        }
    }
}
