use pinrig_logger::{LevelFilter, LogFormat, Logger};

#[test]
fn console_only_logger_has_no_file_guard() {
    let logger = Logger::builder()
        .name("pinrig-console-only")
        .format(LogFormat::Pretty)
        .level(LevelFilter::INFO)
        .init()
        .expect("logger should initialize");

    assert!(logger.guard().is_none(), "console-only logger should not create a file guard");
}
