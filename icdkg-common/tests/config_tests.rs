//! Configuration resolution and graceful degradation
//!
//! Uses serial_test: these tests mutate ICDKG_* environment variables,
//! so they must not run in parallel with each other.

use icdkg_common::config::{
    load_toml_config, ConfigResolver, TomlConfig, ENV_CONFIG_PATH, ENV_NARRATIVE_API_KEY,
    ENV_PORT, ENV_SYNONYMS_PATH, ENV_TAXONOMY_PATH,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn clear_env() {
    for name in [
        ENV_CONFIG_PATH,
        ENV_PORT,
        ENV_TAXONOMY_PATH,
        ENV_SYNONYMS_PATH,
        ENV_NARRATIVE_API_KEY,
    ] {
        env::remove_var(name);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_path_wins_over_env() {
    clear_env();
    let cli = write_config("port = 7001");
    let from_env = write_config("port = 7002");
    env::set_var(ENV_CONFIG_PATH, from_env.path());

    let resolver = ConfigResolver::new(Some(cli.path().to_path_buf()));
    assert_eq!(resolver.config_file(), Some(cli.path().to_path_buf()));
    assert_eq!(resolver.resolve().port, 7001);

    clear_env();
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli() {
    clear_env();
    let from_env = write_config("port = 7002");
    env::set_var(ENV_CONFIG_PATH, from_env.path());

    let config = ConfigResolver::new(None).resolve();
    assert_eq!(config.port, 7002);

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_toml_values() {
    clear_env();
    let file = write_config(
        r#"
        port = 7003
        taxonomy_path = "from-toml.json"
        "#,
    );
    env::set_var(ENV_PORT, "7100");
    env::set_var(ENV_TAXONOMY_PATH, "from-env.json");
    env::set_var(ENV_NARRATIVE_API_KEY, "secret-key");

    let config = ConfigResolver::new(Some(file.path().to_path_buf())).resolve();
    assert_eq!(config.port, 7100);
    assert_eq!(config.taxonomy_path, PathBuf::from("from-env.json"));
    assert_eq!(config.narrative.api_key.as_deref(), Some("secret-key"));

    clear_env();
}

#[test]
#[serial]
fn test_unparseable_env_value_is_ignored() {
    clear_env();
    let file = write_config("port = 7004");
    env::set_var(ENV_PORT, "not-a-port");

    let config = ConfigResolver::new(Some(file.path().to_path_buf())).resolve();
    assert_eq!(config.port, 7004);

    clear_env();
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    clear_env();
    let resolver = ConfigResolver::new(Some(PathBuf::from("/nonexistent/icdkg/config.toml")));

    let config = resolver.resolve();
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_malformed_config_file_falls_back_to_defaults() {
    clear_env();
    let file = write_config("port = \"not a number\"\n[[[");

    assert!(load_toml_config(file.path()).is_err());
    let config = ConfigResolver::new(Some(file.path().to_path_buf())).resolve();
    assert_eq!(config.port, TomlConfig::default().port);
}

#[test]
fn test_full_config_parses() {
    let file = write_config(
        r#"
        taxonomy_path = "/srv/icdkg/icd_hierarchy.json"
        synonyms_path = "/srv/icdkg/umls_mappings.json"
        snapshot_path = "/srv/icdkg/latest.json"
        database_path = "/srv/icdkg/cases.db"
        host = "0.0.0.0"
        port = 8080

        [logging]
        level = "debug"
        file = "/var/log/icdkg.log"

        [prediction]
        top_k = 5
        threshold = 0.4
        model = "DCAN"

        [preprocessing]
        max_text_length = 1024
        remove_stopwords = false
        keep_numbers = false

        [narrative]
        provider = "anthropic"
        model = "claude"
        api_key = "k"
        timeout_secs = 10
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.snapshot_path, Some(PathBuf::from("/srv/icdkg/latest.json")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.prediction.top_k, 5);
    assert_eq!(config.prediction.model, "DCAN");
    assert!(!config.preprocessing.remove_stopwords);
    assert_eq!(config.narrative.provider, "anthropic");
    assert_eq!(config.narrative.timeout_secs, 10);
    assert!(config.narrative.base_url.is_none());
}
