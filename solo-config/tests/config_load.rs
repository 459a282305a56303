use serial_test::serial;
use solo_config::{ActorDetails, LogFormatSetting, SoloConfigLoader};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
runtime:
  worker_threads: 2
  mailbox: 256
logging:
  format: json
  stderr: true
actors:
  - id: hits
    kind: counter
    config:
      initial: 10
  - id: sessions
    kind: kv
    mailbox: 64
    config:
      shards: 4
      seed:
        owner: "${SOLO_TEST_OWNER}"
        visits: 3
  - id: api
    kind: rate
    config:
      capacity: 5
      refill_amount: 2
      refill_every_ms: 250
      initial: 0
  "#;
    let p = write_yaml(&tmp, "solo.yaml", file_yaml);

    let config = temp_env::with_var("SOLO_TEST_OWNER", Some("ops"), || {
        SoloConfigLoader::new()
            .with_file(p)
            .load()
            .expect("load system config")
    });

    assert_eq!(config.version.as_deref(), Some("0.1"));
    assert_eq!(config.runtime.worker_threads, Some(2));
    assert_eq!(config.runtime.mailbox, 256);
    assert_eq!(config.logging.format, LogFormatSetting::Json);
    assert!(config.logging.stderr);
    assert_eq!(config.actors.len(), 3);

    match &config.actors[1].details {
        ActorDetails::Kv { config: kv } => {
            assert_eq!(kv.shards, 4);
            assert_eq!(kv.seed["owner"], "ops");
            assert_eq!(kv.seed["visits"], 3);
        }
        other => panic!("expected kv, got {other:?}"),
    }
    assert_eq!(config.actors[1].mailbox, Some(64));

    match &config.actors[2].details {
        ActorDetails::Rate { config: rate } => {
            assert_eq!(rate.capacity, 5);
            assert_eq!(rate.refill_amount, 2);
            assert_eq!(rate.refill_every_ms, 250);
            assert_eq!(rate.initial, Some(0));
        }
        other => panic!("expected rate, got {other:?}"),
    }
}

#[test]
#[serial]
fn missing_optional_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = SoloConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("optional file may be absent");
    assert!(config.actors.is_empty());
    assert_eq!(config.runtime.mailbox, 1024);
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let res = SoloConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(res.is_err());
}

#[test]
#[serial]
fn rate_actor_requires_its_bucket_settings() {
    let res = SoloConfigLoader::new()
        .with_yaml_str("actors:\n  - id: api\n    kind: rate\n    config:\n      capacity: 3\n")
        .load();
    assert!(res.is_err());
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "solo.yaml",
        "runtime:\n  mailbox: 256\n  shutdown_grace_ms: 900\nlogging:\n  filter: warn\n",
    );

    let config = temp_env::with_vars(
        [
            ("SOLO__RUNTIME__MAILBOX", Some("64")),
            ("SOLO__LOGGING__FILTER", Some("debug")),
        ],
        || SoloConfigLoader::new().with_file(&p).load().expect("load"),
    );

    assert_eq!(config.runtime.mailbox, 64);
    assert_eq!(config.logging.filter, "debug");
    // Keys without an override keep the file value.
    assert_eq!(config.runtime.shutdown_grace_ms, 900);
}

#[test]
#[serial]
fn environment_overrides_inline_yaml() {
    let config = temp_env::with_var("SOLO__RUNTIME__MAILBOX", Some("64"), || {
        SoloConfigLoader::new()
            .with_yaml_str("runtime:\n  mailbox: 256\n")
            .load()
            .expect("load")
    });
    assert_eq!(config.runtime.mailbox, 64);
}
