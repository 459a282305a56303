use anyhow::{Context, Result, bail};
use serde::Serialize;
use solo_actors::{
    ActorSystem, Value,
    counter::{Counter, CounterHandle},
    rate::{BucketCfg, RateLimiter, RateLimiterHandle},
    shard::ShardedKv,
};
use solo_config::{ActorDetails, RateConfig, SoloConfig};
use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};
use tracing::info;

pub struct Named<T> {
    pub id: String,
    pub handle: T,
}

/// Every configured actor, spawned inside one [`ActorSystem`].
pub struct Fleet {
    system: ActorSystem,
    pub counters: Vec<Named<CounterHandle>>,
    pub stores: Vec<Named<ShardedKv>>,
    pub limiters: Vec<Named<RateLimiterHandle>>,
}

#[derive(Debug, Serialize)]
pub struct StoreState {
    pub shards: usize,
    pub entries: usize,
}

#[derive(Debug, Serialize)]
pub struct FleetState {
    pub counters: BTreeMap<String, i64>,
    pub stores: BTreeMap<String, StoreState>,
    pub limiters: BTreeMap<String, u32>,
}

impl Fleet {
    /// Spawn every enabled actor. Must run inside a tokio runtime.
    pub fn build(cfg: &SoloConfig) -> Result<Self> {
        let mut system = ActorSystem::new();
        let mut counters = Vec::new();
        let mut stores = Vec::new();
        let mut limiters = Vec::new();

        for spec in cfg.enabled_actors() {
            let mailbox = spec.mailbox.unwrap_or(cfg.runtime.mailbox);
            match &spec.details {
                ActorDetails::Counter { config } => {
                    let handle = system.spawn(&spec.id, Counter::new(config.initial), mailbox);
                    counters.push(Named {
                        id: spec.id.clone(),
                        handle,
                    });
                }
                ActorDetails::Kv { config } => {
                    let seed = seed_values(&spec.id, &config.seed)?;
                    let handle =
                        ShardedKv::spawn_in(&mut system, &spec.id, config.shards, mailbox, seed);
                    stores.push(Named {
                        id: spec.id.clone(),
                        handle,
                    });
                }
                ActorDetails::Rate { config } => {
                    let bucket = bucket_cfg(&spec.id, config)?;
                    let limiter = match config.initial {
                        Some(tokens) => RateLimiter::with_tokens(bucket, tokens),
                        None => RateLimiter::new(bucket),
                    };
                    let handle = system.spawn(&spec.id, limiter, mailbox);
                    limiters.push(Named {
                        id: spec.id.clone(),
                        handle,
                    });
                }
            }
            info!(actor = %spec.id, mailbox, "fleet.spawned");
        }

        Ok(Self {
            system,
            counters,
            stores,
            limiters,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.stores.is_empty() && self.limiters.is_empty()
    }

    /// Snapshot of every actor's state, one call per actor.
    pub async fn inspect(&self) -> Result<FleetState> {
        let mut state = FleetState {
            counters: BTreeMap::new(),
            stores: BTreeMap::new(),
            limiters: BTreeMap::new(),
        };
        for c in &self.counters {
            state.counters.insert(c.id.clone(), c.handle.get().await?);
        }
        for s in &self.stores {
            let store = StoreState {
                shards: s.handle.shards().len(),
                entries: s.handle.len().await?,
            };
            state.stores.insert(s.id.clone(), store);
        }
        for l in &self.limiters {
            state.limiters.insert(l.id.clone(), l.handle.available().await?);
        }
        Ok(state)
    }

    /// Stop every actor, wait for all of them, and surface actor faults.
    pub async fn shutdown(self) -> Result<()> {
        info!(actors = self.system.len(), "fleet.shutdown");
        self.system.graceful_shutdown().await
    }
}

fn seed_values(
    id: &str,
    seed: &BTreeMap<String, serde_json::Value>,
) -> Result<HashMap<String, Value>> {
    seed.iter()
        .map(|(key, raw)| {
            let value = Value::try_from(raw.clone()).with_context(|| {
                format!("actor `{id}`: seed value for `{key}` must be null, bool, int or string")
            })?;
            Ok((key.clone(), value))
        })
        .collect()
}

fn bucket_cfg(id: &str, cfg: &RateConfig) -> Result<BucketCfg> {
    if cfg.capacity == 0 {
        bail!("actor `{id}`: capacity must be positive");
    }
    if cfg.refill_amount == 0 {
        bail!("actor `{id}`: refill_amount must be positive");
    }
    if cfg.refill_every_ms == 0 {
        bail!("actor `{id}`: refill_every_ms must be positive");
    }
    Ok(
        BucketCfg::new(cfg.capacity, Duration::from_millis(cfg.refill_every_ms))
            .with_refill_amount(cfg.refill_amount),
    )
}
