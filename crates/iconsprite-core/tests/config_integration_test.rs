use iconsprite_core::{ConfigError, ConfigManager, SpriteConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_file_persistence() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("iconsprite.toml");

    ConfigManager::create_default_config(&config_path).unwrap();
    assert!(config_path.exists());

    let manager = ConfigManager::load_from(&config_path).unwrap();
    assert_eq!(manager.config_path(), Some(config_path.as_path()));
    assert_eq!(manager.config().output, SpriteConfig::default().output);
    assert!(manager.config().prefixes.contains_key("icons"));
}

#[test]
fn test_relative_prefix_dirs_resolve_against_config_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("iconsprite.toml");
    fs::write(
        &config_path,
        r#"
output = "icons.svg"

[prefixes]
mdi = "assets/mdi"
abs = "/opt/icons"
"#,
    )
    .unwrap();

    let config = ConfigManager::load_from(&config_path).unwrap().into_config();
    assert_eq!(config.prefixes["mdi"], temp_dir.path().join("assets/mdi"));
    assert_eq!(config.prefixes["abs"], std::path::PathBuf::from("/opt/icons"));
    assert_eq!(config.output, "icons.svg");
}

#[test]
fn test_missing_and_malformed_files() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");
    assert!(matches!(
        ConfigManager::load_from(&missing),
        Err(ConfigError::NotFound(_))
    ));

    let broken = temp_dir.path().join("broken.toml");
    fs::write(&broken, "prefixes = 3").unwrap();
    assert!(matches!(
        ConfigManager::load_from(&broken),
        Err(ConfigError::ParseError(_))
    ));
}
