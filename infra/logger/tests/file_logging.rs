use pinrig_logger::{LogSettings, Logger};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn settings_with_directory_write_json_lines() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let settings = LogSettings {
        console: false,
        directory: Some(log_dir.clone()),
        json_files: true,
        ..LogSettings::default()
    };
    let logger = Logger::from_settings("pinrig-file-logging", &settings)?;
    assert!(logger.guard().is_some());

    tracing::info!(device = "trough", balls = 3, "counted balls");

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("log file should be created");

    let contents = fs::read_to_string(&log_file)?;
    let line = contents.lines().find(|l| l.contains("counted balls")).expect("event logged");
    let json: serde_json::Value = serde_json::from_str(line)?;
    assert_eq!(json["fields"]["device"], "trough");

    Ok(())
}
