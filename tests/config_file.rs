//! Runtime configuration persistence

use funcrun::RuntimeConfig;
use tempfile::TempDir;

#[test]
fn save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("funcrun.json");

    let config = RuntimeConfig {
        memory_limit: 8 * 1024 * 1024,
        max_stack_size: 256 * 1024,
        gc_threshold: Some(1024 * 1024),
    };
    config.save(&path).unwrap();

    let loaded = RuntimeConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn missing_fields_take_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{"memory_limit": 1048576}"#).unwrap();

    let loaded = RuntimeConfig::load(&path).unwrap();
    assert_eq!(loaded.memory_limit, 1024 * 1024);
    assert_eq!(loaded.max_stack_size, RuntimeConfig::default().max_stack_size);
    assert_eq!(loaded.gc_threshold, None);
}

#[test]
fn missing_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");

    let err = RuntimeConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.json"));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = RuntimeConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}
