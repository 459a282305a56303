//! Stop requests and lifecycle reporting.
//!
//! Stopping uses two signals: the caller-side [`CancellationToken`] means "please stop"
//! and the loop-owned [`Phase`] channel means "I have stopped". Cancelling a token is
//! idempotent and wakes every listener at once.
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of an actor loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Running,
    /// Stop observed; operations already in the mailbox are still being answered.
    Draining,
    Stopped,
}

/// Caller side of an actor's shutdown.
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    stop: CancellationToken,
    phase: watch::Receiver<Phase>,
}

impl ShutdownCoordinator {
    /// Request a stop. Safe to call any number of times from any task.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Block until the loop reports [`Phase::Stopped`].
    pub async fn wait(&self) {
        let mut phase = self.phase.clone();
        // An error means the reporter is gone, which only happens after `Stopped`.
        let _ = phase.wait_for(|p| *p == Phase::Stopped).await;
    }
}

/// Loop side of the phase channel. Publishes `Stopped` when dropped, so waiters are
/// released even if the loop task unwinds.
pub(crate) struct PhaseReporter {
    tx: watch::Sender<Phase>,
}

impl PhaseReporter {
    pub(crate) fn set(&self, phase: Phase) {
        self.tx.send_replace(phase);
    }
}

impl Drop for PhaseReporter {
    fn drop(&mut self) {
        self.tx.send_replace(Phase::Stopped);
    }
}

pub(crate) fn coordinator(stop: CancellationToken) -> (ShutdownCoordinator, PhaseReporter) {
    let (tx, rx) = watch::channel(Phase::Running);
    (
        ShutdownCoordinator { stop, phase: rx },
        PhaseReporter { tx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_the_reporter_releases_waiters() {
        let (coord, reporter) = coordinator(CancellationToken::new());
        assert_eq!(coord.phase(), Phase::Running);
        reporter.set(Phase::Draining);
        assert_eq!(coord.phase(), Phase::Draining);

        let waiter = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.wait().await })
        };
        drop(reporter);
        waiter.await.unwrap();
        assert_eq!(coord.phase(), Phase::Stopped);
    }

    #[test]
    fn stop_is_idempotent() {
        let (coord, _reporter) = coordinator(CancellationToken::new());
        coord.stop();
        coord.stop();
        assert!(coord.is_stop_requested());
    }
}
