//! Loader for `solo.yaml` with environment overlays.
//!
//! Sources are merged in order: each attached file or inline YAML snippet, then
//! `SOLO__`-prefixed environment variables; later sources override earlier keys, so
//! the environment always wins. After merging, every string value has `${VAR}` placeholders expanded (recursively,
//! up to a fixed depth).
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SoloConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
}

impl SoloConfig {
    /// Actors that are not explicitly disabled.
    pub fn enabled_actors(&self) -> impl Iterator<Item = &ActorSpec> {
        self.actors.iter().filter(|a| a.enabled.unwrap_or(true))
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Tokio worker threads; `None` uses one per core.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Default mailbox capacity for actors without their own.
    #[serde(default = "default_mailbox")]
    pub mailbox: usize,
    /// How long the runtime waits for stray tasks on exit.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            mailbox: default_mailbox(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormatSetting,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub stderr: bool,
    /// Directory for the rolling log file; omit to log to stderr only.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormatSetting::default(),
            filter: default_filter(),
            stderr: false,
            dir: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    #[default]
    Text,
    Json,
}

/// Shared fields + the per-kind "details"
#[derive(Debug, Deserialize)]
pub struct ActorSpec {
    pub id: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub mailbox: Option<usize>,
    #[serde(flatten)]
    pub details: ActorDetails,
}

/// The tag is `kind`; the payload lives in `config`
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActorDetails {
    Counter {
        #[serde(default)]
        config: CounterConfig,
    },
    Kv {
        #[serde(default)]
        config: KvConfig,
    },
    Rate { config: RateConfig },
}

#[derive(Debug, Default, Deserialize)]
pub struct CounterConfig {
    #[serde(default)]
    pub initial: i64,
}

#[derive(Debug, Deserialize)]
pub struct KvConfig {
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Initial entries; values must be scalars.
    #[serde(default)]
    pub seed: BTreeMap<String, Value>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            seed: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RateConfig {
    pub capacity: u32,
    #[serde(default = "default_refill_amount")]
    pub refill_amount: u32,
    pub refill_every_ms: u64,
    /// Starting tokens; a full bucket when omitted.
    #[serde(default)]
    pub initial: Option<u32>,
}

fn default_mailbox() -> usize {
    1024
}
fn default_shutdown_grace_ms() -> u64 {
    500
}
fn default_filter() -> String {
    "info".into()
}
fn default_shards() -> usize {
    1
}
fn default_refill_amount() -> u32 {
    1
}

/// Expand `$VAR`/`${VAR}` in every string, following values that themselves contain
/// placeholders. Unknown variables are left verbatim; cycles stop at the depth cap.
fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut cur = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let expanded = shellexpand::env(&cur)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| cur.clone());
                if expanded == cur {
                    break;
                }
                cur = expanded;
            }
            *s = cur;
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SoloConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SoloConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SoloConfigLoader {
    /// Empty loader. `SOLO__` environment overrides (`SOLO__RUNTIME__MAILBOX=64`) are
    /// applied on top of every attached source when [`load`](Self::load) runs.
    ///
    /// ```
    /// use solo_config::SoloConfigLoader;
    ///
    /// let config = SoloConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nactors: []")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(config.actors.is_empty());
    /// assert_eq!(config.runtime.mailbox, 1024);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, for environment-only deployments.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use solo_config::{ActorDetails, SoloConfigLoader};
    ///
    /// let cfg = SoloConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "test"
    /// actors:
    ///   - id: "hits"
    ///     kind: "counter"
    ///     config:
    ///       initial: 5
    ///   - id: "api"
    ///     kind: "rate"
    ///     config:
    ///       capacity: 10
    ///       refill_every_ms: 100
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.actors.len(), 2);
    /// assert!(matches!(cfg.actors[0].details, ActorDetails::Counter { ref config } if config.initial == 5));
    /// assert!(matches!(cfg.actors[1].details, ActorDetails::Rate { ref config } if config.refill_amount == 1));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use solo_config::{ActorDetails, SoloConfigLoader};
    ///
    /// unsafe { std::env::set_var("SOLO_DOC_GREETING", "hello"); }
    ///
    /// let config = SoloConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// actors:
    ///   - id: "sessions"
    ///     kind: "kv"
    ///     config:
    ///       shards: 2
    ///       seed:
    ///         greeting: "${SOLO_DOC_GREETING}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &config.actors[0].details {
    ///     ActorDetails::Kv { config } => {
    ///         assert_eq!(config.shards, 2);
    ///         assert_eq!(config.seed["greeting"], "hello");
    ///     }
    ///     _ => panic!("expected kv configuration"),
    /// }
    ///
    /// unsafe { std::env::remove_var("SOLO_DOC_GREETING"); }
    /// ```
    pub fn load(self) -> Result<SoloConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("SOLO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
