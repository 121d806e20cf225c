//! Integration tests for the exported logging macros
//!
//! Exercises the `engine_*!` macros from outside the crate, the way the
//! Vulkan backend uses them. No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use aurora_engine::aurora::log::{LogEntry, LogSeverity, Logger};
use aurora_engine::aurora::{Engine, Error, Result};
use aurora_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_trace, engine_warn};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

fn install_capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn validate_size(size: u64) -> Result<u64> {
    if size == 0 {
        engine_bail!("backend::buffer", "Buffer size must be non-zero");
    }
    Ok(size)
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_macros_route_to_custom_logger() {
    let entries = install_capture();

    engine_trace!("backend::device", "trace {}", 1);
    engine_debug!("backend::device", "debug {}", 2);
    engine_info!("backend::device", "info {}", 3);
    engine_warn!("backend::device", "warn {}", 4);
    engine_error!("backend::device", "error {}", 5);

    let captured = entries.lock().unwrap();
    let severities: Vec<LogSeverity> = captured.iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![LogSeverity::Trace, LogSeverity::Debug, LogSeverity::Info, LogSeverity::Warn, LogSeverity::Error]
    );
    assert_eq!(captured[2].message, "info 3");
    assert!(captured[3].file.is_none());
    assert!(captured[4].file.is_some());
    assert!(captured[4].line.is_some());
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_err_logs_and_returns_backend_error() {
    let entries = install_capture();

    let error = engine_err!("backend::queue", "Queue submit failed: {}", "DEVICE_LOST");
    match error {
        Error::BackendError(message) => assert_eq!(message, "Queue submit failed: DEVICE_LOST"),
        other => panic!("unexpected error: {:?}", other),
    }

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, "backend::queue");
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_bail_returns_early() {
    let entries = install_capture();

    assert_eq!(validate_size(16).unwrap(), 16);
    assert!(entries.lock().unwrap().is_empty());

    let result = validate_size(0);
    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_reset_detaches_capture() {
    let entries = install_capture();
    engine_info!("backend::device", "captured");
    Engine::reset_logger();
    engine_info!("backend::device", "not captured");

    assert_eq!(entries.lock().unwrap().len(), 1);
}
