//! Key-value state partitioned over several independent actors.
//!
//! Each shard is a plain [`KvStore`] actor owning a disjoint slice of the key space;
//! no state is shared between them. Keys are routed by a hash that is fixed for the
//! lifetime of the `ShardedKv`.
use crate::actor::{spawn_actor, ActorHandle};
use crate::error::ActorError;
use crate::kv::{KvHandle, KvStore};
use crate::system::ActorSystem;
use crate::value::Value;
use futures::future::{join_all, try_join_all};
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

#[derive(Clone)]
pub struct ShardedKv {
    shards: Vec<KvHandle>,
    router: RandomState,
}

impl ShardedKv {
    /// Spawn `shards` standalone KV actors.
    pub fn spawn(shards: usize, mailbox: usize) -> Self {
        Self::build("kv", shards, Vec::new(), |name, store| {
            spawn_actor(name, store, mailbox)
        })
    }

    /// Spawn the shards inside `system`, distributing `seed` across them.
    pub fn spawn_in(
        system: &mut ActorSystem,
        name: &str,
        shards: usize,
        mailbox: usize,
        seed: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        Self::build(name, shards, seed, |shard_name, store| {
            system.spawn(shard_name, store, mailbox)
        })
    }

    fn build(
        name: &str,
        shards: usize,
        seed: impl IntoIterator<Item = (String, Value)>,
        mut spawn: impl FnMut(&str, KvStore) -> KvHandle,
    ) -> Self {
        let count = shards.max(1);
        let router = RandomState::new();
        let mut partitions: Vec<Vec<(String, Value)>> = vec![Vec::new(); count];
        for (key, value) in seed {
            partitions[route(&router, count, &key)].push((key, value));
        }
        let shards = partitions
            .into_iter()
            .enumerate()
            .map(|(i, entries)| spawn(&format!("{name}#{i}"), KvStore::with_entries(entries)))
            .collect();
        Self { shards, router }
    }

    pub fn shards(&self) -> &[KvHandle] {
        &self.shards
    }

    /// The shard that owns `key`.
    pub fn shard_for(&self, key: &str) -> &ActorHandle<KvStore> {
        &self.shards[route(&self.router, self.shards.len(), key)]
    }

    pub async fn get(&self, key: &str) -> Result<Value, ActorError> {
        self.shard_for(key).get(key).await
    }

    pub async fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ActorError> {
        let key = key.into();
        let shard = self.shard_for(&key);
        shard.set(key, value).await
    }

    pub async fn delete(&self, key: &str) -> Result<Option<Value>, ActorError> {
        self.shard_for(key).delete(key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ActorError> {
        self.shard_for(key).exists(key).await
    }

    /// Total entries, asking every shard concurrently.
    pub async fn len(&self) -> Result<usize, ActorError> {
        let sizes = try_join_all(self.shards.iter().map(|s| s.len())).await?;
        Ok(sizes.into_iter().sum())
    }

    pub async fn is_empty(&self) -> Result<bool, ActorError> {
        Ok(self.len().await? == 0)
    }

    pub async fn shutdown_and_wait(&self) {
        join_all(self.shards.iter().map(|s| s.shutdown_and_wait())).await;
    }
}

fn route(router: &RandomState, shards: usize, key: &str) -> usize {
    (router.hash_one(key) % shards as u64) as usize
}
