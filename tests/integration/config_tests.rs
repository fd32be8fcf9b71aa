//! Loading configuration files from disk

use crate::common::config_toml;
use shelf_scout::config::{compute_config_hash, load_config, load_config_with_hash, SoftBlockPolicy};
use shelf_scout::ConfigError;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_from_file() {
    let file = write_config(&config_toml(
        "https://shop.example",
        &["shop", "books"],
        3,
        r#"on-soft-block = "complete-if-any""#,
    ));

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.runner.on_soft_block, SoftBlockPolicy::CompleteIfAny);
    assert_eq!(config.sources[1].name, "books");
    assert_eq!(config.sources[1].max_pages, 3);
    assert_eq!(config.fetch.user_agent, "ShelfScoutTest/1.0");
}

#[test]
fn test_hash_changes_with_content() {
    let a = write_config(&config_toml("https://shop.example", &["shop"], 1, ""));
    let b = write_config(&config_toml("https://shop.example", &["shop"], 2, ""));

    let (_, hash_a) = load_config_with_hash(a.path()).unwrap();
    assert_eq!(hash_a.len(), 64);
    assert_eq!(hash_a, compute_config_hash(a.path()).unwrap());
    assert_ne!(hash_a, compute_config_hash(b.path()).unwrap());
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = write_config(&config_toml("ftp://shop.example", &["shop"], 1, ""));
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::InvalidTemplate(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        load_config(std::path::Path::new("/nonexistent/scout.toml")),
        Err(ConfigError::Io(_))
    ));
}
