//! Request messages and their single-use reply conduits.
//!
//! Every [`Operation`] owns a fresh [`ReplySender`]; the matching [`ReplyReceiver`]
//! stays with the caller. The sender is consumed by `send`, so an operation can be
//! answered at most once, and the reply is stamped with the operation's [`OpId`] so
//! the receiver can check it got its own answer.
use crate::error::Failure;
use crate::value::Value;
use std::fmt;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// What a handler answers: a value, or a domain failure carried as data.
pub type Outcome = Result<Value, Failure>;

/// Unique identity of one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpId(Uuid);

impl OpId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug)]
struct Reply {
    id: OpId,
    outcome: Outcome,
}

/// Write side of a reply conduit. Held by the actor loop once the operation is sent.
pub struct ReplySender {
    id: OpId,
    tx: Option<oneshot::Sender<Reply>>,
}

impl ReplySender {
    pub fn id(&self) -> OpId {
        self.id
    }

    /// True once the caller dropped its receiver (timed out or gave up).
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Deliver the single reply. Never blocks; a reply nobody waits for is discarded.
    pub fn send(mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            if tx.send(Reply {
                id: self.id,
                outcome,
            })
            .is_err()
            {
                debug!(op = %self.id, "reply.dropped; caller abandoned the call");
            }
        }
    }
}

impl Drop for ReplySender {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!(op = %self.id, "reply conduit closed without a reply");
        }
    }
}

/// Read side of a reply conduit, kept by the caller.
pub struct ReplyReceiver {
    id: OpId,
    rx: oneshot::Receiver<Reply>,
}

impl ReplyReceiver {
    pub fn id(&self) -> OpId {
        self.id
    }

    /// Wait for the reply. `None` means the conduit closed without a value: the actor
    /// stopped before it serviced the operation.
    ///
    /// Panics if the reply carries another operation's id.
    pub async fn recv(self) -> Option<Outcome> {
        let reply = self.rx.await.ok()?;
        assert_eq!(reply.id, self.id, "reply delivered to the wrong caller");
        Some(reply.outcome)
    }
}

/// One request to an actor.
///
/// `kind` selects the handler; `key` and `value` are optional inputs whose meaning
/// depends on the kind.
pub struct Operation<K> {
    kind: K,
    key: Option<String>,
    value: Option<Value>,
    reply: ReplySender,
}

impl<K: Copy> Operation<K> {
    /// Build an operation and the receiver its reply will arrive on.
    ///
    /// ```
    /// use solo_actors::operation::Operation;
    /// use solo_actors::value::Value;
    ///
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let (op, pending) = Operation::new("echo", None, Some(Value::Int(7)));
    ///     assert_eq!(op.id(), pending.id());
    ///     let echoed = op.value().cloned().unwrap();
    ///     op.reply(Ok(echoed));
    ///     assert_eq!(pending.recv().await, Some(Ok(Value::Int(7))));
    /// });
    /// ```
    pub fn new(kind: K, key: Option<String>, value: Option<Value>) -> (Self, ReplyReceiver) {
        let id = OpId::new();
        let (tx, rx) = oneshot::channel();
        let op = Self {
            kind,
            key,
            value,
            reply: ReplySender { id, tx: Some(tx) },
        };
        (op, ReplyReceiver { id, rx })
    }

    pub fn kind(&self) -> K {
        self.kind
    }
}

impl<K> Operation<K> {
    pub fn id(&self) -> OpId {
        self.reply.id()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn require_key(&self) -> Result<&str, Failure> {
        self.key().ok_or(Failure::MissingKey)
    }

    pub fn require_int(&self) -> Result<i64, Failure> {
        let value = self.value.as_ref().ok_or(Failure::MissingValue)?;
        value.as_int().ok_or(Failure::TypeMismatch {
            expected: "int",
            found: value.kind(),
        })
    }

    pub fn take_key(&mut self) -> Option<String> {
        self.key.take()
    }

    pub fn take_value(&mut self) -> Option<Value> {
        self.value.take()
    }

    /// The caller no longer waits for this reply.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    /// Answer the operation, consuming it.
    pub fn reply(self, outcome: Outcome) {
        self.reply.send(outcome);
    }
}

impl<K: fmt::Debug> fmt::Debug for Operation<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.reply.id)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}
