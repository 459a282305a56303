use crate::error::ActorError;
use crate::operation::{Operation, ReplyReceiver};
use crate::shutdown::{self, Phase, PhaseReporter, ShutdownCoordinator};
use crate::value::Value;
use anyhow::Result;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Mailbox size used by the bundled state machines.
pub const DEFAULT_MAILBOX: usize = 1024;

/// An actor owns its state exclusively; the loop calls it from a single task.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    /// Tag selecting the handler for an operation.
    type Kind: Copy + fmt::Debug + Send + 'static;

    /// Handle one operation and reply to it, or park it to reply later.
    ///
    /// Domain failures are replied as data. Returning `Err` is an actor fault: the
    /// loop stops without draining.
    async fn handle(&mut self, op: Operation<Self::Kind>, ctx: &mut Context) -> Result<()>;

    /// Period of the private internal timer, if the actor needs one.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    async fn on_tick(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    /// Called once after draining, right before the state is dropped.
    async fn on_stop(&mut self, _ctx: &mut Context) {}
}

/// Runtime context for an actor instance.
pub struct Context {
    name: Arc<str>,
    draining: bool,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once a stop was observed and the loop only empties its mailbox.
    pub fn is_draining(&self) -> bool {
        self.draining
    }
}

/// Request conduit of an actor.
pub struct Addr<A: Actor>(mpsc::Sender<Operation<A::Kind>>);

/// Manual Clone to avoid unnecessary bounds on `A`.
impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Async send; awaits backpressure. Returns the operation if the mailbox is closed.
    pub async fn send(
        &self,
        op: Operation<A::Kind>,
    ) -> std::result::Result<(), Operation<A::Kind>> {
        self.0.send(op).await.map_err(|e| e.0)
    }

    /// Try to send without waiting. Returns the operation if the mailbox is full or closed.
    pub fn try_send(
        &self,
        op: Operation<A::Kind>,
    ) -> std::result::Result<(), Operation<A::Kind>> {
        self.0.try_send(op).map_err(|e| e.into_inner())
    }

    /// Bounded mailbox capacity.
    pub fn capacity(&self) -> usize {
        self.0.max_capacity()
    }

    /// The loop stopped accepting operations.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Client handle: typed calls, shutdown, and lifecycle queries for one actor.
///
/// Domain methods live in the modules of each state machine as inherent impls on
/// `ActorHandle<TheirActor>`.
pub struct ActorHandle<A: Actor> {
    name: Arc<str>,
    addr: Addr<A>,
    shutdown: ShutdownCoordinator,
}

impl<A: Actor> Clone for ActorHandle<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            addr: self.addr.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<A: Actor> ActorHandle<A> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> Addr<A> {
        self.addr.clone()
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    pub fn phase(&self) -> Phase {
        self.shutdown.phase()
    }

    pub fn is_stopped(&self) -> bool {
        self.phase() == Phase::Stopped
    }

    /// One round trip: send an operation and wait for its reply.
    ///
    /// ```
    /// use solo_actors::counter::{self, CounterOp};
    ///
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let counter = counter::spawn(41);
    ///     let value = counter.call(CounterOp::Increment, None, None).await.unwrap();
    ///     assert_eq!(value.as_int(), Some(42));
    ///     counter.shutdown_and_wait().await;
    /// });
    /// ```
    pub async fn call(
        &self,
        kind: A::Kind,
        key: Option<String>,
        value: Option<Value>,
    ) -> Result<Value, ActorError> {
        let (op, pending) = Operation::new(kind, key, value);
        if self.addr.send(op).await.is_err() {
            return Err(self.unreachable());
        }
        self.await_reply(pending).await
    }

    /// Like [`call`](Self::call) but stops waiting after `timeout`.
    ///
    /// An operation that already reached the mailbox is still handled; its reply is
    /// discarded.
    pub async fn call_timeout(
        &self,
        kind: A::Kind,
        key: Option<String>,
        value: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, ActorError> {
        match time::timeout(timeout, self.call(kind, key, value)).await {
            Ok(res) => res,
            Err(_) => Err(ActorError::Timeout { after: timeout }),
        }
    }

    /// Race mailbox admission against `timeout`.
    ///
    /// Either the operation is sent and a reply is awaited, or nothing was sent and
    /// [`ActorError::Timeout`] is returned; there is no partial effect.
    pub async fn try_call(
        &self,
        kind: A::Kind,
        key: Option<String>,
        value: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, ActorError> {
        let permit = match time::timeout(timeout, self.addr.0.reserve()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(self.unreachable()),
            Err(_) => return Err(ActorError::Timeout { after: timeout }),
        };
        let (op, pending) = Operation::new(kind, key, value);
        permit.send(op);
        self.await_reply(pending).await
    }

    /// Request a stop without waiting. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.stop();
    }

    /// Block until the loop reached [`Phase::Stopped`].
    pub async fn wait(&self) {
        self.shutdown.wait().await;
    }

    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        self.wait().await;
    }

    async fn await_reply(&self, pending: ReplyReceiver) -> Result<Value, ActorError> {
        match pending.recv().await {
            Some(Ok(value)) => Ok(value),
            Some(Err(failure)) => Err(ActorError::Failed(failure)),
            None => Err(self.unreachable()),
        }
    }

    fn unreachable(&self) -> ActorError {
        ActorError::Unreachable {
            actor: self.name.to_string(),
        }
    }
}

/// Spawn an actor with a bounded mailbox and its own stop token.
///
/// Stop conditions:
/// - `shutdown` is called on any clone of the handle
/// - every handle and `Addr` is dropped
/// - `handle` returns `Err`
///
/// ```
/// use solo_actors::actor::spawn_actor;
/// use solo_actors::kv::KvStore;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let kv = spawn_actor("kv:doc", KvStore::new(), 8);
///     assert_eq!(kv.addr().capacity(), 8);
///     kv.set("a", 1).await.unwrap();
///     assert_eq!(kv.len().await.unwrap(), 1);
///     kv.shutdown_and_wait().await;
///     assert!(kv.is_stopped());
/// });
/// ```
pub fn spawn_actor<A: Actor>(name: &str, actor: A, capacity: usize) -> ActorHandle<A> {
    let (handle, _task) =
        spawn_actor_with_shutdown(name, actor, capacity, CancellationToken::new());
    handle
}

/// Spawn an actor whose stop signal is `stop` (usually a child of a system token).
/// Returns the loop task so callers can observe actor faults.
pub fn spawn_actor_with_shutdown<A: Actor>(
    name: &str,
    actor: A,
    capacity: usize,
    stop: CancellationToken,
) -> (ActorHandle<A>, JoinHandle<Result<()>>) {
    let name: Arc<str> = Arc::from(name);
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (coordinator, reporter) = shutdown::coordinator(stop.clone());
    let task = tokio::spawn(run_loop(actor, rx, stop, reporter, name.clone()));
    let handle = ActorHandle {
        name,
        addr: Addr(tx),
        shutdown: coordinator,
    };
    (handle, task)
}

async fn run_loop<A: Actor>(
    mut actor: A,
    mut rx: mpsc::Receiver<Operation<A::Kind>>,
    stop: CancellationToken,
    phase: PhaseReporter,
    name: Arc<str>,
) -> Result<()> {
    let mut ctx = Context {
        name,
        draining: false,
    };
    let mut ticker = actor.tick_interval().map(internal_ticker);
    debug!(actor = %ctx.name, "actor.started");

    let outcome: Result<()> = loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => {
                debug!(actor = %ctx.name, "actor.stop_requested");
                break Ok(());
            }
            maybe_op = rx.recv() => match maybe_op {
                Some(op) => {
                    if let Err(e) = actor.handle(op, &mut ctx).await {
                        break Err(e);
                    }
                }
                None => {
                    debug!(actor = %ctx.name, "actor.all_handles_dropped");
                    break Ok(());
                }
            },
            _ = next_tick(&mut ticker) => {
                if let Err(e) = actor.on_tick(&mut ctx).await {
                    break Err(e);
                }
            }
        }
    };

    phase.set(Phase::Draining);
    ctx.draining = true;
    rx.close();
    let outcome = match outcome {
        Ok(()) => drain(&mut actor, &mut rx, &mut ctx).await,
        Err(e) => Err(e),
    };
    actor.on_stop(&mut ctx).await;
    // Anything still queued after a fault is dropped here; those callers see `Unreachable`.
    drop(rx);

    match &outcome {
        Ok(()) => debug!(actor = %ctx.name, "actor.stopped"),
        Err(e) => error!(actor = %ctx.name, error = ?e, "actor returned error; stopping"),
    }
    drop(phase);
    outcome
}

async fn drain<A: Actor>(
    actor: &mut A,
    rx: &mut mpsc::Receiver<Operation<A::Kind>>,
    ctx: &mut Context,
) -> Result<()> {
    let mut drained = 0usize;
    while let Some(op) = rx.recv().await {
        actor.handle(op, ctx).await?;
        drained += 1;
    }
    if drained > 0 {
        debug!(actor = %ctx.name, drained, "actor.drained");
    }
    Ok(())
}

fn internal_ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
