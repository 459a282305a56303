//! Key-value store actor.
//!
//! Keys are unique strings; values are non-null [`Value`]s. `Null` is reserved in
//! replies to mean "there was no previous value".
use crate::actor::{spawn_actor, Actor, ActorHandle, Context, DEFAULT_MAILBOX};
use crate::error::{ActorError, Failure};
use crate::operation::{Operation, Outcome};
use crate::value::Value;
use anyhow::Result;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KvOp {
    Get,
    Set,
    Delete,
    Exists,
    Len,
}

#[derive(Debug, Default)]
pub struct KvStore {
    entries: HashMap<String, Value>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store. Null values are skipped.
    pub fn with_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect(),
        }
    }

    fn get(&self, op: &Operation<KvOp>) -> Outcome {
        let key = op.require_key()?;
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| Failure::NotFound { key: key.into() })
    }

    fn set(&mut self, op: &mut Operation<KvOp>) -> Outcome {
        let key = op.take_key().ok_or(Failure::MissingKey)?;
        let value = op.take_value().ok_or(Failure::MissingValue)?;
        if value.is_null() {
            return Err(Failure::InvalidInput("null values cannot be stored".into()));
        }
        Ok(self.entries.insert(key, value).unwrap_or(Value::Null))
    }

    fn delete(&mut self, op: &Operation<KvOp>) -> Outcome {
        let key = op.require_key()?;
        self.entries
            .remove(key)
            .ok_or_else(|| Failure::NotFound { key: key.into() })
    }
}

#[async_trait::async_trait]
impl Actor for KvStore {
    type Kind = KvOp;

    async fn handle(&mut self, mut op: Operation<KvOp>, _ctx: &mut Context) -> Result<()> {
        let outcome = match op.kind() {
            KvOp::Get => self.get(&op),
            KvOp::Set => self.set(&mut op),
            KvOp::Delete => self.delete(&op),
            KvOp::Exists => op
                .require_key()
                .map(|k| Value::Bool(self.entries.contains_key(k))),
            KvOp::Len => Ok(Value::Int(self.entries.len() as i64)),
        };
        op.reply(outcome);
        Ok(())
    }
}

pub type KvHandle = ActorHandle<KvStore>;

/// Start a key-value actor holding `seed`.
pub fn spawn(seed: impl IntoIterator<Item = (String, Value)>) -> KvHandle {
    spawn_actor("kv", KvStore::with_entries(seed), DEFAULT_MAILBOX)
}

impl ActorHandle<KvStore> {
    /// Fails with [`Failure::NotFound`] when the key is absent.
    pub async fn get(&self, key: &str) -> Result<Value, ActorError> {
        self.call(KvOp::Get, Some(key.to_string()), None).await
    }

    /// Insert or replace; returns the previous value.
    pub async fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ActorError> {
        let previous = self
            .call(KvOp::Set, Some(key.into()), Some(value.into()))
            .await?;
        Ok(previous.into_option())
    }

    /// Remove a key; returns the removed value, `None` if it was absent.
    pub async fn delete(&self, key: &str) -> Result<Option<Value>, ActorError> {
        match self.call(KvOp::Delete, Some(key.to_string()), None).await {
            Ok(removed) => Ok(Some(removed)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ActorError> {
        self.call(KvOp::Exists, Some(key.to_string()), None)
            .await?
            .into_bool()
    }

    pub async fn len(&self) -> Result<usize, ActorError> {
        let n = self.call(KvOp::Len, None, None).await?.into_int()?;
        Ok(n.max(0) as usize)
    }

    pub async fn is_empty(&self) -> Result<bool, ActorError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_len_delete_scenario() {
        let kv = spawn([]);
        kv.set("a", 1).await.unwrap();
        kv.set("b", 2).await.unwrap();
        assert_eq!(kv.len().await.unwrap(), 2);
        assert_eq!(kv.delete("a").await.unwrap(), Some(Value::Int(1)));
        assert_eq!(kv.len().await.unwrap(), 1);
        assert!(kv.get("a").await.unwrap_err().is_not_found());
        kv.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn set_returns_previous_value() {
        let kv = spawn([("k".to_string(), Value::from("old"))]);
        assert_eq!(kv.set("k", "new").await.unwrap(), Some(Value::from("old")));
        assert_eq!(kv.set("fresh", true).await.unwrap(), None);
        assert_eq!(kv.get("k").await.unwrap(), Value::from("new"));
        kv.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let kv = spawn([]);
        kv.set("gone", 5).await.unwrap();
        assert!(kv.exists("gone").await.unwrap());
        kv.delete("gone").await.unwrap();
        assert!(!kv.exists("gone").await.unwrap());
        assert_eq!(kv.delete("gone").await.unwrap(), None);
        kv.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn null_values_are_rejected() {
        let kv = spawn([]);
        let err = kv.set("n", Value::Null).await.unwrap_err();
        assert!(matches!(err.failure(), Some(Failure::InvalidInput(_))));
        assert!(kv.is_empty().await.unwrap());
        kv.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn raw_get_without_key_is_rejected() {
        let kv = spawn([]);
        let err = kv.call(KvOp::Get, None, None).await.unwrap_err();
        assert_eq!(err.failure(), Some(&Failure::MissingKey));
        kv.shutdown_and_wait().await;
    }
}
