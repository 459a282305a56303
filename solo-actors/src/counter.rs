use crate::actor::{spawn_actor, Actor, ActorHandle, Context, DEFAULT_MAILBOX};
use crate::error::{ActorError, Failure};
use crate::operation::{Operation, Outcome};
use crate::value::Value;
use anyhow::Result;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterOp {
    Increment,
    Decrement,
    Get,
    /// Replace the count with the operation's int value.
    Set,
    Reset,
}

/// A single `i64` owned by its actor loop. Every operation replies with the count
/// after the operation.
#[derive(Debug, Default)]
pub struct Counter {
    value: i64,
}

impl Counter {
    pub fn new(initial: i64) -> Self {
        Self { value: initial }
    }

    fn add(&mut self, delta: i64) -> Outcome {
        self.value = self.value.checked_add(delta).ok_or(Failure::Overflow)?;
        Ok(Value::Int(self.value))
    }
}

#[async_trait::async_trait]
impl Actor for Counter {
    type Kind = CounterOp;

    async fn handle(&mut self, op: Operation<CounterOp>, _ctx: &mut Context) -> Result<()> {
        let outcome = match op.kind() {
            CounterOp::Increment => self.add(1),
            CounterOp::Decrement => self.add(-1),
            CounterOp::Get => Ok(Value::Int(self.value)),
            CounterOp::Set => op.require_int().map(|v| {
                self.value = v;
                Value::Int(v)
            }),
            CounterOp::Reset => {
                self.value = 0;
                Ok(Value::Int(0))
            }
        };
        op.reply(outcome);
        Ok(())
    }
}

pub type CounterHandle = ActorHandle<Counter>;

/// Start a counter actor at `initial`.
pub fn spawn(initial: i64) -> CounterHandle {
    spawn_actor("counter", Counter::new(initial), DEFAULT_MAILBOX)
}

impl ActorHandle<Counter> {
    pub async fn increment(&self) -> Result<i64, ActorError> {
        self.call(CounterOp::Increment, None, None).await?.into_int()
    }

    pub async fn decrement(&self) -> Result<i64, ActorError> {
        self.call(CounterOp::Decrement, None, None).await?.into_int()
    }

    pub async fn get(&self) -> Result<i64, ActorError> {
        self.call(CounterOp::Get, None, None).await?.into_int()
    }

    pub async fn set(&self, value: i64) -> Result<i64, ActorError> {
        self.call(CounterOp::Set, None, Some(Value::Int(value)))
            .await?
            .into_int()
    }

    pub async fn reset(&self) -> Result<(), ActorError> {
        self.call(CounterOp::Reset, None, None).await?;
        Ok(())
    }

    /// Increment unless the mailbox stays full for `timeout`.
    pub async fn try_increment(&self, timeout: Duration) -> Result<i64, ActorError> {
        self.try_call(CounterOp::Increment, None, None, timeout)
            .await?
            .into_int()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increments_then_reset() {
        let counter = spawn(0);
        for _ in 0..3 {
            counter.increment().await.unwrap();
        }
        assert_eq!(counter.get().await.unwrap(), 3);
        counter.reset().await.unwrap();
        assert_eq!(counter.get().await.unwrap(), 0);
        counter.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn set_and_decrement() {
        let counter = spawn(10);
        assert_eq!(counter.decrement().await.unwrap(), 9);
        assert_eq!(counter.set(-4).await.unwrap(), -4);
        assert_eq!(counter.decrement().await.unwrap(), -5);
        counter.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn overflow_is_a_failure_not_a_crash() {
        let counter = spawn(i64::MAX);
        let err = counter.increment().await.unwrap_err();
        assert_eq!(err.failure(), Some(&Failure::Overflow));
        assert_eq!(counter.get().await.unwrap(), i64::MAX);
        counter.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn raw_set_without_value_is_rejected() {
        let counter = spawn(1);
        let err = counter.call(CounterOp::Set, None, None).await.unwrap_err();
        assert_eq!(err.failure(), Some(&Failure::MissingValue));
        assert_eq!(counter.get().await.unwrap(), 1);
        counter.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn try_increment_with_room_in_the_mailbox() {
        let counter = spawn(0);
        let value = counter
            .try_increment(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(value, 1);
        counter.shutdown_and_wait().await;
    }
}
