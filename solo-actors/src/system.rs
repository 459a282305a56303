//! Actor system bookkeeping: loop task tracking and group shutdown.
//!
//! Every actor spawned through [`ActorSystem::spawn`] gets a child of the system's stop
//! token, so it can be stopped on its own through its handle or together with the
//! rest. The `JoinSet` makes sure every loop is awaited during teardown and that actor
//! faults and panics are reported rather than lost.
use crate::actor::{spawn_actor_with_shutdown, Actor, ActorHandle};
use anyhow::{Context as _, Result};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct ActorSystem {
    joinset: JoinSet<Result<()>>,
    shutdown: CancellationToken,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        Self::with_parent(&CancellationToken::new())
    }

    /// Cancelling `parent` stops every actor of this system.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            joinset: JoinSet::new(),
            shutdown: parent.child_token(),
        }
    }

    /// Spawn an actor and track its loop.
    ///
    /// ```
    /// use solo_actors::counter::Counter;
    /// use solo_actors::system::ActorSystem;
    ///
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let mut system = ActorSystem::new();
    ///     let counter = system.spawn("hits", Counter::new(0), 16);
    ///     counter.increment().await.unwrap();
    ///     system.graceful_shutdown().await.unwrap();
    ///     assert!(counter.is_stopped());
    /// });
    /// ```
    pub fn spawn<A: Actor>(&mut self, name: &str, actor: A, mailbox: usize) -> ActorHandle<A> {
        let (handle, task) =
            spawn_actor_with_shutdown(name, actor, mailbox, self.shutdown.child_token());
        let name = name.to_string();
        self.track(async move {
            task.await
                .with_context(|| format!("actor `{name}` panicked"))?
                .with_context(|| format!("actor `{name}` failed"))
        });
        debug!(actor = %handle.name(), "system.spawned");
        handle
    }

    pub fn track(&mut self, fut: impl std::future::Future<Output = Result<()>> + Send + 'static) {
        self.joinset.spawn(fut);
    }

    /// Number of tracked loops not yet joined.
    pub fn len(&self) -> usize {
        self.joinset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joinset.is_empty()
    }

    /// Token that stops the whole system when cancelled, for wiring into other tasks.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Stop every actor, wait for all loops, and report the first failure.
    pub async fn graceful_shutdown(mut self) -> Result<()> {
        self.shutdown.cancel();
        let mut first_err = None;
        while let Some(res) = self.joinset.join_next().await {
            let res = res.map_err(anyhow::Error::from).and_then(|r| r);
            if let Err(e) = res {
                error!(error = ?e, "system.shutdown_error");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use crate::shutdown::Phase;

    #[tokio::test]
    async fn cancelling_the_parent_stops_every_actor() {
        let root = CancellationToken::new();
        let mut system = ActorSystem::with_parent(&root);
        let a = system.spawn("a", Counter::new(0), 4);
        let b = system.spawn("b", Counter::new(0), 4);

        root.cancel();
        a.wait().await;
        b.wait().await;
        assert_eq!(a.phase(), Phase::Stopped);
        system.graceful_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_handle_is_the_system_token() {
        let mut system = ActorSystem::new();
        let counter = system.spawn("c", Counter::new(0), 4);
        let handle = system.shutdown_handle();
        assert!(!handle.is_cancelled());

        system.signal_shutdown();
        assert!(handle.is_cancelled());
        counter.wait().await;
        assert!(system.graceful_shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn tracked_failures_are_reported() {
        let mut system = ActorSystem::new();
        system.track(async { anyhow::bail!("side task failed") });
        let err = system.graceful_shutdown().await.unwrap_err();
        assert!(err.to_string().contains("side task failed"));
    }
}
