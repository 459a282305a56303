//! Error taxonomy for actor calls.
//!
//! [`Failure`] is a domain failure: it travels back to the caller as data inside the
//! reply and never stops the actor. [`ActorError`] is what a client handle returns; it
//! keeps "the actor could not be reached" apart from "the actor said no".
use std::time::Duration;

/// Domain failure replied by a handler.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("insufficient tokens: requested {requested}, available {available}")]
    InsufficientTokens { requested: u32, available: u32 },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("operation requires a key")]
    MissingKey,

    #[error("operation requires a value")]
    MissingValue,

    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Error returned by [`ActorHandle`](crate::actor::ActorHandle) calls.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// The mailbox is closed or the actor stopped before replying.
    #[error("actor `{actor}` is unreachable")]
    Unreachable { actor: String },

    /// The actor handled the operation and replied with a domain failure.
    #[error(transparent)]
    Failed(#[from] Failure),

    /// The caller stopped waiting.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The reply payload did not have the shape the typed method expects.
    #[error("unexpected reply: expected {expected}, found {found}")]
    UnexpectedReply {
        expected: &'static str,
        found: &'static str,
    },
}

impl ActorError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ActorError::Unreachable { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ActorError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ActorError::Failed(Failure::NotFound { .. }))
    }

    /// The domain failure, if the actor replied with one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ActorError::Failed(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_failures_stay_distinct_from_unreachable() {
        let failed: ActorError = Failure::NotFound { key: "a".into() }.into();
        assert!(failed.is_not_found());
        assert!(!failed.is_unreachable());
        assert_eq!(failed.to_string(), "key not found: a");

        let gone = ActorError::Unreachable {
            actor: "kv".into(),
        };
        assert!(gone.is_unreachable());
        assert!(gone.failure().is_none());
    }
}
