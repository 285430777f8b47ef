//! Integration tests for the logging system

use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LogLevel, LoggingConfig,
};

#[test]
fn test_file_logging_writes_events() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("migration.log");

    // Only one global subscriber per process, so this is the single init in this binary
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_filter("logging_integration=debug")
        .with_log_file(&log_path);
    init_logging(config).unwrap();

    tracing::info!(path = "/Photos/img.jpg", "File migrated");

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("File migrated"));
    assert!(contents.contains("/Photos/img.jpg"));
    // Colors are disabled when writing to a file
    assert!(!contents.contains("\u{1b}["));

    // A second initialization is rejected
    assert!(init_logging(LoggingConfig::default()).is_err());
}

#[test]
fn test_redaction_of_credentials() {
    assert_eq!(redact_if_sensitive("access_token", "sl.abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "r-123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("app_secret", "s3cr3t"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("folder", "/Docs"), "/Docs");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/tmp/cloud-migrate/a_b.txt"), "a_b.txt");
    assert_eq!(strip_path("D:\\staging\\file.txt"), "file.txt");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Compact);
}
