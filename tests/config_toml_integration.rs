use server_migration::integration::{MigrationConfig, ReportConfig};
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_config_serialization_roundtrip() {
    let original_config = MigrationConfig {
        interactive: true,
        log_filter: Some("server_migration=debug".to_string()),
        report: ReportConfig {
            json_path: Some(PathBuf::from("reports/migration.json")),
            summary_path: None,
            print_summary: true,
        },
        ..Default::default()
    }
    .with_property_overrides([("subsystems.skip".to_string(), "true".to_string())]);

    let toml_str = original_config
        .to_toml_string()
        .expect("Should be able to serialize config to TOML");
    assert!(toml_str.contains("interactive = true"));
    assert!(toml_str.contains("[properties]"));

    let deserialized_config = MigrationConfig::from_toml_str(&toml_str)
        .expect("Should be able to deserialize TOML string");
    assert_eq!(original_config, deserialized_config);
}

#[test]
fn test_config_file_operations() {
    let original_config = MigrationConfig::default()
        .with_property_overrides([("logging.level".to_string(), "INFO".to_string())]);

    let temp_file = NamedTempFile::new().expect("Should be able to create temporary file");
    let temp_path = temp_file.path();

    original_config
        .to_toml_file(temp_path)
        .expect("Should be able to save config to file");
    let loaded_config =
        MigrationConfig::from_toml_file(temp_path).expect("Should be able to load config from file");

    assert_eq!(original_config, loaded_config);
    assert_eq!(
        loaded_config
            .environment()
            .property_as_string("logging.level")
            .as_deref(),
        Some("INFO")
    );
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = MigrationConfig::from_toml_str("").expect("Empty config should parse");
    assert_eq!(config, MigrationConfig::default());
    assert!(!config.interactive);
    assert!(!config.report.print_summary);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = MigrationConfig::from_toml_str("properties = \"not a table\"");
    assert!(result.is_err());
}
