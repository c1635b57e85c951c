//! Configuration loading and graceful degradation tests
//!
//! Tests that manipulate environment variables are marked `#[serial]` so they
//! do not race each other.

use moodtune_common::config::{
    apply_env_overrides, is_valid_key, load_config, read_toml_config, resolve_openai_api_key,
    CuratorConfig, StoreBackend, TomlConfig, MIN_TRACKS_FLOOR,
};
use moodtune_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_env() {
    for name in [
        "MOODTUNE_STORE_BACKEND",
        "MOODTUNE_OS_HOST",
        "MOODTUNE_OS_PORT",
        "MOODTUNE_OS_USER",
        "MOODTUNE_OS_PASSWORD",
        "MOODTUNE_OS_INDEX",
        "MOODTUNE_SQLITE_PATH",
        "MOODTUNE_MUSIC_SERVICE_URL",
        "MOODTUNE_OPENAI_MODEL",
        "MOODTUNE_MIN_TRACKS",
        "MOODTUNE_AUTO_SEED",
        "OPENAI_API_KEY",
    ] {
        env::remove_var(name);
    }
}

#[test]
fn test_defaults() {
    let config = TomlConfig::default();

    assert_eq!(config.store.backend, StoreBackend::OpenSearch);
    assert_eq!(config.store.index, "moodtune_tracks");
    assert_eq!(config.store.base_url(), "http://opensearch:9200");
    assert_eq!(config.curator.embedding_dim, 1536);
    assert_eq!(config.rag.min_tracks, 20);
    assert_eq!(config.rag.max_relax_steps, 2);
    assert_eq!(config.rag.augment_rounds, 4);
    assert_eq!(config.rag.avoid_cap, 100);
    assert!((config.rag.relax_step - 0.1).abs() < f64::EPSILON);
    assert!(config.emotions.is_empty());
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = load_config(Some(&missing)).expect("missing file must not be fatal");
    assert_eq!(config.rag.min_tracks, 20);
    assert_eq!(config.server.port, 5780);
}

#[test]
#[serial]
fn test_partial_toml_fills_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("moodtune.toml");
    fs::write(
        &path,
        r#"
[store]
backend = "sqlite"
sqlite_path = "/tmp/moodtune.db"

[rag]
max_relax_steps = 3

[emotions.calm]
valence = [0.4, 0.8]
energy = [0.0, 0.3]
"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.rag.max_relax_steps, 3);
    assert_eq!(config.rag.augment_rounds, 4);
    let calm = config.emotions.get("calm").expect("calm emotion");
    assert_eq!(calm.valence, [0.4, 0.8]);
    assert_eq!(calm.energy, [0.0, 0.3]);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[rag\nmin_tracks = ").unwrap();

    match read_toml_config(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("Parse TOML failed")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var("MOODTUNE_STORE_BACKEND", "memory");
    env::set_var("MOODTUNE_OS_INDEX", "custom_index");
    env::set_var("MOODTUNE_MIN_TRACKS", "30");
    env::set_var("OPENAI_API_KEY", "sk-env");

    let mut config = TomlConfig::default();
    config.curator.api_key = Some("sk-toml".to_string());
    apply_env_overrides(&mut config).unwrap();

    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.store.index, "custom_index");
    assert_eq!(config.rag.min_tracks, 30);
    assert_eq!(config.curator.api_key.as_deref(), Some("sk-env"));

    clear_env();
}

#[test]
#[serial]
fn test_min_tracks_floor() {
    clear_env();
    env::set_var("MOODTUNE_MIN_TRACKS", "5");

    let mut config = TomlConfig::default();
    apply_env_overrides(&mut config).unwrap();
    assert_eq!(config.rag.min_tracks, MIN_TRACKS_FLOOR);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_value_is_config_error() {
    clear_env();
    env::set_var("MOODTUNE_OS_PORT", "not-a-port");

    let mut config = TomlConfig::default();
    let result = apply_env_overrides(&mut config);
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
fn test_unknown_backend_rejected() {
    assert!("opensearch".parse::<StoreBackend>().is_ok());
    assert!(" SQLite ".parse::<StoreBackend>().is_ok());
    assert!(matches!("redis".parse::<StoreBackend>(), Err(Error::Config(_))));
}

#[test]
fn test_api_key_resolution() {
    assert!(is_valid_key("sk-123"));
    assert!(!is_valid_key("   "));

    let mut curator = CuratorConfig::default();
    let err = resolve_openai_api_key(&curator).unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"));

    curator.api_key = Some("  sk-abc  ".to_string());
    assert_eq!(resolve_openai_api_key(&curator).unwrap(), "sk-abc");
}
