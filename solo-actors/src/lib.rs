//! Single-owner concurrent state actors.
//!
//! An actor is one tokio task that exclusively owns some state. Callers never touch
//! that state; they send an [`Operation`] through the actor's mailbox and wait on the
//! operation's private reply conduit. All mutation is therefore serialized by the
//! loop, with no locks involved.
//!
//! - [`actor`]: the [`Actor`] trait, the loop, [`ActorHandle`] and [`Addr`]
//! - [`operation`]: [`Operation`] and its single-use reply conduit
//! - [`shutdown`]: stop requests and the published [`Phase`]
//! - [`system`]: group spawning and graceful shutdown
//! - [`counter`], [`kv`], [`shard`], [`rate`]: bundled state machines
//!
//! ```
//! use solo_actors::counter;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let hits = counter::spawn(0);
//!     let mut callers = Vec::new();
//!     for _ in 0..10 {
//!         let hits = hits.clone();
//!         callers.push(tokio::spawn(async move { hits.increment().await }));
//!     }
//!     for caller in callers {
//!         caller.await.unwrap().unwrap();
//!     }
//!     assert_eq!(hits.get().await.unwrap(), 10);
//!     hits.shutdown_and_wait().await;
//! });
//! ```
pub mod actor;
pub mod counter;
pub mod error;
pub mod kv;
pub mod operation;
pub mod rate;
pub mod shard;
pub mod shutdown;
pub mod system;
pub mod value;

pub use actor::{spawn_actor, Actor, ActorHandle, Addr, Context};
pub use error::{ActorError, Failure};
pub use operation::{OpId, Operation, Outcome, ReplyReceiver, ReplySender};
pub use shutdown::{Phase, ShutdownCoordinator};
pub use system::ActorSystem;
pub use value::Value;
