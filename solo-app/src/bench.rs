//! Concurrent workloads driven against a [`Fleet`].
//!
//! Each configured actor gets `callers` independent tasks issuing `ops` operations
//! apiece. Counters and stores are checked for lost updates afterwards; limiters are
//! driven with non-blocking acquires so a drained bucket never stalls the run.
use crate::fleet::Fleet;
use futures::future::join_all;
use serde::Serialize;
use solo_actors::Value;
use std::{future::Future, time::Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
pub struct BenchRun {
    pub actor: String,
    pub kind: &'static str,
    pub callers: usize,
    pub ops: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub ops_per_sec: f64,
    /// Whether the final state matches what the successful operations imply.
    /// Limiters report `None`: refills make their final state time dependent.
    pub consistent: Option<bool>,
}

/// Per-caller tally of `(succeeded, failed)` operations.
type Tally = (usize, usize);

pub async fn run(fleet: &Fleet, callers: usize, ops: usize) -> Vec<BenchRun> {
    let callers = callers.max(1);
    let mut runs = Vec::new();

    for c in &fleet.counters {
        let before = c.handle.get().await.ok();
        let handle = c.handle.clone();
        let mut run = drive(&c.id, "counter", callers, ops, move |_| {
            let handle = handle.clone();
            async move {
                let mut tally = (0, 0);
                for _ in 0..ops {
                    match handle.increment().await {
                        Ok(_) => tally.0 += 1,
                        Err(e) => {
                            debug!(error = %e, "bench.increment_failed");
                            tally.1 += 1;
                        }
                    }
                }
                tally
            }
        })
        .await;
        let after = c.handle.get().await.ok();
        run.consistent = match (before, after) {
            (Some(b), Some(a)) => Some(a - b == run.succeeded as i64),
            _ => Some(false),
        };
        runs.push(run);
    }

    for s in &fleet.stores {
        let before = s.handle.len().await.ok();
        let store = s.handle.clone();
        let id = s.id.clone();
        let mut run = drive(&s.id, "kv", callers, ops, move |caller| {
            let store = store.clone();
            let id = id.clone();
            async move {
                let mut tally = (0, 0);
                for i in 0..ops {
                    let key = format!("bench:{id}:{caller}:{i}");
                    let expected = Value::Int(i as i64);
                    let round_trip = async {
                        store.set(key.as_str(), expected.clone()).await?;
                        let got = store.get(&key).await?;
                        store.delete(&key).await?;
                        Ok::<_, solo_actors::ActorError>(got == expected)
                    };
                    match round_trip.await {
                        Ok(true) => tally.0 += 1,
                        Ok(false) => {
                            warn!(%key, "bench.read_mismatch");
                            tally.1 += 1;
                        }
                        Err(e) => {
                            debug!(%key, error = %e, "bench.kv_failed");
                            tally.1 += 1;
                        }
                    }
                }
                tally
            }
        })
        .await;
        let after = s.handle.len().await.ok();
        run.consistent = Some(run.failed == 0 && before.is_some() && before == after);
        runs.push(run);
    }

    for l in &fleet.limiters {
        let handle = l.handle.clone();
        let run = drive(&l.id, "rate", callers, ops, move |_| {
            let handle = handle.clone();
            async move {
                let mut tally = (0, 0);
                for _ in 0..ops {
                    match handle.try_acquire().await {
                        Ok(true) => tally.0 += 1,
                        Ok(false) => tally.1 += 1,
                        Err(e) => {
                            debug!(error = %e, "bench.acquire_failed");
                            tally.1 += 1;
                        }
                    }
                }
                tally
            }
        })
        .await;
        runs.push(run);
    }

    runs
}

async fn drive<F, Fut>(
    actor: &str,
    kind: &'static str,
    callers: usize,
    ops: usize,
    caller: F,
) -> BenchRun
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Tally> + Send + 'static,
{
    let started = Instant::now();
    let tasks: Vec<_> = (0..callers).map(|i| tokio::spawn(caller(i))).collect();

    let mut succeeded = 0;
    let mut failed = 0;
    for joined in join_all(tasks).await {
        match joined {
            Ok((ok, err)) => {
                succeeded += ok;
                failed += err;
            }
            Err(e) => {
                warn!(%actor, error = %e, "bench.caller_panicked");
                failed += ops;
            }
        }
    }

    let elapsed = started.elapsed();
    let total = succeeded + failed;
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = if secs > 0.0 { total as f64 / secs } else { 0.0 };
    info!(%actor, kind, succeeded, failed, elapsed_ms = elapsed.as_millis() as u64, "bench.done");

    BenchRun {
        actor: actor.to_string(),
        kind,
        callers,
        ops,
        succeeded,
        failed,
        elapsed_ms: elapsed.as_millis() as u64,
        ops_per_sec,
        consistent: None,
    }
}
