//! Utilities shared across the solo crates.
//!
//! Deliberately small so that every crate, including test binaries, can depend on it.
//!
//! - [`observability`]: centralised `tracing` initialisation
//!
//! ```rust
//! use solo_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     to_file: false,
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.app_name, "solo");
//! assert_eq!(cfg.default_filter, "info");
//! ```
pub mod observability;
