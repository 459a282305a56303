use crate::actor::{spawn_actor, Actor, ActorHandle, Context, DEFAULT_MAILBOX};
use crate::error::{ActorError, Failure};
use crate::operation::Operation;
use crate::value::Value;
use anyhow::Result;
use std::{collections::VecDeque, time::Duration};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateOp {
    /// Take `value` tokens (default 1); replies once they are available.
    Acquire,
    /// Take `value` tokens (default 1) now or fail with `InsufficientTokens`.
    TryAcquire,
    Available,
}

/// Token-bucket rate limiter as an actor.
///
/// Semantics:
/// - The bucket starts full unless built with [`RateLimiter::with_tokens`].
/// - Every `refill_every`, `refill_amount` tokens are added, capped at `capacity`.
///   The refill runs on the loop's private timer, not through the mailbox.
/// - `Acquire` parks the operation in FIFO order until enough tokens exist.
/// - `TryAcquire` never waits and never jumps ahead of parked acquires.
///
/// Invariant: `tokens <= capacity` after every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketCfg {
    pub capacity: u32,
    pub refill_amount: u32,
    pub refill_every: Duration,
}

impl BucketCfg {
    /// One token per `refill_every`. Capacity is at least 1.
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_amount: 1,
            refill_every,
        }
    }

    pub fn with_refill_amount(mut self, amount: u32) -> Self {
        self.refill_amount = amount;
        self
    }
}

struct Waiter {
    need: u32,
    op: Operation<RateOp>,
}

pub struct RateLimiter {
    cfg: BucketCfg,
    tokens: u32,
    waiters: VecDeque<Waiter>,
}

impl RateLimiter {
    pub fn new(cfg: BucketCfg) -> Self {
        Self::with_tokens(cfg, cfg.capacity)
    }

    /// Start with `tokens` (clamped to capacity) instead of a full bucket.
    pub fn with_tokens(cfg: BucketCfg, tokens: u32) -> Self {
        Self {
            cfg,
            tokens: tokens.min(cfg.capacity),
            waiters: VecDeque::new(),
        }
    }

    fn requested(&self, op: &Operation<RateOp>) -> Result<u32, Failure> {
        let Some(value) = op.value() else {
            return Ok(1);
        };
        let n = value.as_int().ok_or(Failure::TypeMismatch {
            expected: "int",
            found: value.kind(),
        })?;
        if n < 1 || n > i64::from(self.cfg.capacity) {
            return Err(Failure::InvalidInput(format!(
                "token request {n} outside 1..={}",
                self.cfg.capacity
            )));
        }
        Ok(n as u32)
    }

    fn take(&mut self, need: u32) -> bool {
        if self.waiters.is_empty() && self.tokens >= need {
            self.tokens -= need;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        self.tokens = self
            .tokens
            .saturating_add(self.cfg.refill_amount)
            .min(self.cfg.capacity);
    }

    /// Hand tokens to parked acquires in arrival order. Callers that gave up are
    /// dropped without consuming anything.
    fn serve_waiters(&mut self) {
        let parked = self.waiters.len();
        self.waiters.retain(|w| !w.op.is_abandoned());
        if self.waiters.len() < parked {
            debug!(pruned = parked - self.waiters.len(), "rate.waiters_abandoned");
        }
        while let Some(front) = self.waiters.front() {
            // A caller can give up between the prune and its turn.
            if front.op.is_abandoned() {
                let gone = self.waiters.pop_front();
                debug!(op = ?gone.map(|w| w.op.id()), "rate.waiter_abandoned");
                continue;
            }
            if self.tokens < front.need {
                break;
            }
            if let Some(Waiter { need, op }) = self.waiters.pop_front() {
                self.tokens -= need;
                op.reply(Ok(Value::Int(self.tokens.into())));
            }
        }
    }

    fn check_invariant(&self) {
        assert!(
            self.tokens <= self.cfg.capacity,
            "token bucket above capacity: {} > {}",
            self.tokens,
            self.cfg.capacity
        );
    }
}

#[async_trait::async_trait]
impl Actor for RateLimiter {
    type Kind = RateOp;

    async fn handle(&mut self, op: Operation<RateOp>, ctx: &mut Context) -> Result<()> {
        match op.kind() {
            RateOp::Available => op.reply(Ok(Value::Int(self.tokens.into()))),
            RateOp::TryAcquire => {
                let outcome = self.requested(&op).and_then(|need| {
                    self.serve_waiters();
                    if self.take(need) {
                        Ok(Value::Int(self.tokens.into()))
                    } else {
                        Err(Failure::InsufficientTokens {
                            requested: need,
                            available: self.tokens,
                        })
                    }
                });
                op.reply(outcome);
            }
            RateOp::Acquire => match self.requested(&op) {
                Err(failure) => op.reply(Err(failure)),
                Ok(need) => {
                    self.serve_waiters();
                    if self.take(need) {
                        op.reply(Ok(Value::Int(self.tokens.into())));
                    } else if ctx.is_draining() {
                        // No refill will run again; the caller sees the actor as gone.
                        debug!(actor = %ctx.name(), op = %op.id(), "rate.acquire_during_drain");
                    } else {
                        self.waiters.push_back(Waiter { need, op });
                    }
                }
            },
        }
        self.check_invariant();
        Ok(())
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.cfg.refill_every)
    }

    async fn on_tick(&mut self, _ctx: &mut Context) -> Result<()> {
        self.refill();
        self.serve_waiters();
        self.check_invariant();
        Ok(())
    }

    async fn on_stop(&mut self, ctx: &mut Context) {
        if !self.waiters.is_empty() {
            debug!(actor = %ctx.name(), parked = self.waiters.len(), "rate.releasing_waiters");
            self.waiters.clear();
        }
    }
}

pub type RateLimiterHandle = ActorHandle<RateLimiter>;

/// Start a rate limiter with a full bucket.
pub fn spawn(cfg: BucketCfg) -> RateLimiterHandle {
    spawn_actor("rate", RateLimiter::new(cfg), DEFAULT_MAILBOX)
}

impl ActorHandle<RateLimiter> {
    /// Wait for one token.
    pub async fn acquire(&self) -> Result<(), ActorError> {
        self.acquire_many(1).await
    }

    pub async fn acquire_many(&self, n: u32) -> Result<(), ActorError> {
        self.call(RateOp::Acquire, None, Some(n.into())).await?;
        Ok(())
    }

    /// Take one token if available right now.
    pub async fn try_acquire(&self) -> Result<bool, ActorError> {
        self.try_acquire_many(1).await
    }

    pub async fn try_acquire_many(&self, n: u32) -> Result<bool, ActorError> {
        match self.call(RateOp::TryAcquire, None, Some(n.into())).await {
            Ok(_) => Ok(true),
            Err(ActorError::Failed(Failure::InsufficientTokens { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn available(&self) -> Result<u32, ActorError> {
        let n = self.call(RateOp::Available, None, None).await?.into_int()?;
        u32::try_from(n).map_err(|_| ActorError::UnexpectedReply {
            expected: "token count",
            found: "int",
        })
    }
}
