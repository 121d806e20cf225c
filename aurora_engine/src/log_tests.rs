//! Unit tests for log.rs
//!
//! Tests LogSeverity ordering, LogEntry, DefaultLogger filtering and the
//! error-producing macros.

use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::error::Error;
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "aurora::test".to_string(),
        message: format!("{:?} message", severity),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Info.label(), "INFO ");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_with_location() {
    let e = entry(LogSeverity::Error, Some("swapchain.rs"), Some(87));
    let cloned = e.clone();
    assert_eq!(cloned.file, Some("swapchain.rs"));
    assert_eq!(cloned.line, Some(87));
    assert_eq!(cloned.source, "aurora::test");
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_min_severity_defaults_to_debug() {
    assert_eq!(DefaultLogger::default().min_severity(), LogSeverity::Debug);
}

#[test]
fn test_default_logger_all_severities() {
    // Exercises both the plain and the file:line formatting branches
    let logger = DefaultLogger::new(LogSeverity::Trace);
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("frame_orchestrator.rs"), Some(12)));
    }
}

#[test]
fn test_default_logger_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// CUSTOM LOGGER TESTS
// ============================================================================

struct CountingLogger {
    count: std::sync::Mutex<usize>,
}

impl Logger for CountingLogger {
    fn log(&self, _entry: &LogEntry) {
        *self.count.lock().unwrap() += 1;
    }
}

#[test]
fn test_custom_logger_implementation() {
    let logger = CountingLogger { count: std::sync::Mutex::new(0) };
    logger.log(&entry(LogSeverity::Info, None, None));
    logger.log(&entry(LogSeverity::Warn, None, None));
    assert_eq!(*logger.count.lock().unwrap(), 2);
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
fn test_engine_err_macro_yields_backend_error() {
    let err = crate::engine_err!("aurora::test", "fence {} lost", 3);
    match err {
        Error::BackendError(msg) => assert_eq!(msg, "fence 3 lost"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_engine_bail_macro_returns_early() {
    fn fails(flag: bool) -> crate::error::Result<u32> {
        if flag {
            crate::engine_bail!("aurora::test", "bail with {}", "reason");
        }
        Ok(7)
    }

    assert!(matches!(fails(true), Err(Error::BackendError(_))));
    assert_eq!(fails(false).unwrap(), 7);
}
