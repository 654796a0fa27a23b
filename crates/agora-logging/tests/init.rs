//! Global subscriber installation
//!
//! A process can hold one global subscriber, so everything that needs it
//! lives in a single test.

use agora_logging::{AgoraSubscriberBuilder, FileConfig, LogConfig, LoggingError, RotationStrategy};
use serde_json::Value;

#[test]
fn test_file_output_and_second_install() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig {
        file: Some(FileConfig {
            directory: dir.path().to_path_buf(),
            prefix: "node".to_string(),
            rotation: RotationStrategy::Never,
            max_files: None,
        }),
        ..LogConfig::testing()
    };

    let guard = AgoraSubscriberBuilder::new()
        .with_config(config)
        .with_console(false)
        .try_init()
        .unwrap();
    assert!(guard.is_some());

    tracing::warn!(replayed = 3, "offline queue flushed");
    drop(guard);

    let lines: Vec<Value> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .flat_map(|content| {
            content
                .lines()
                .map(|line| serde_json::from_str::<Value>(line).unwrap())
                .collect::<Vec<_>>()
        })
        .collect();

    let flushed = lines
        .iter()
        .find(|line| line["message"] == "offline queue flushed")
        .expect("event written to file");
    assert_eq!(flushed["replayed"], 3);
    assert_eq!(flushed["level"], "WARN");

    let again = AgoraSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
    assert!(matches!(again, Err(LoggingError::AlreadyInitialized)));

    // The convenience initializer tolerates the existing subscriber
    agora_logging::init_testing();
}
