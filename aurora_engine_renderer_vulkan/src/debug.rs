/// Validation layer messenger
///
/// Receives validation layer messages, filters them by severity and category,
/// counts them, and writes them to the console (colored) and/or a log file.
/// Configuration lives in a process-wide slot installed at device creation
/// and cleared when the device is dropped.

use ash::vk;
use colored::*;
use aurora_engine::aurora::device::{
    Config as DeviceConfig, DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats,
};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

static DEBUG_CONFIG: Mutex<Option<DebugConfig>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrence count per message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Messenger settings extracted from the device [`Config`](DeviceConfig)
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl From<&DeviceConfig> for DebugConfig {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        }
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===== CONFIGURATION =====

/// Install the messenger configuration and reset counters
pub fn init_debug_config(config: DebugConfig) {
    VALIDATION_STATS.reset();
    *lock(&MESSAGE_TRACKER) = Some(FxHashMap::default());
    *lock(&DEBUG_CONFIG) = Some(config);
}

/// Remove the messenger configuration (messages received afterwards are ignored)
pub fn cleanup_debug_config() {
    *lock(&DEBUG_CONFIG) = None;
    *lock(&MESSAGE_TRACKER) = None;
}

/// Severity mask requested from the driver for a given setting
pub fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

// ===== FILTERING =====

pub fn passes_severity(
    setting: DebugSeverity,
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
) -> bool {
    severity.intersects(severity_flags(setting))
}

/// Validation wins over performance when both type bits are set
pub fn passes_category(
    filter: &DebugMessageFilter,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
) -> bool {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        filter.show_performance
    } else {
        filter.show_general
    }
}

fn severity_label(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> (&'static str, ColoredString) {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        ("ERROR", "ERROR".red().bold())
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        ("WARNING", "WARNING".yellow().bold())
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        ("INFO", "INFO".cyan())
    } else {
        ("VERBOSE", "VERBOSE".bright_black())
    }
}

fn type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn track_message(message: &str) -> u32 {
    let mut guard = lock(&MESSAGE_TRACKER);
    let count = guard
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

// ===== STATISTICS =====

/// Counters of messages that passed the filters since device creation
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let repeated = lock(&MESSAGE_TRACKER)
        .as_ref()
        .map(|tracker| tracker.values().filter(|&&count| count > 1).count())
        .unwrap_or(0);
    if repeated > 0 {
        println!("\n  {} message(s) appeared multiple times", repeated);
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

// ===== CALLBACK =====

/// Debug messenger callback registered with the driver
///
/// # Safety
///
/// Called by the validation layer with a valid callback data pointer.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let Some(config) = lock(&DEBUG_CONFIG).clone() else {
        return vk::FALSE;
    };

    if !passes_severity(config.severity, message_severity)
        || !passes_category(&config.message_filter, message_type)
    {
        return vk::FALSE;
    }

    let (message_id, message) = match p_callback_data.as_ref() {
        Some(data) => (
            cstr_or(data.p_message_id_name, "Unknown"),
            cstr_or(data.p_message, "No message"),
        ),
        None => ("Unknown".to_string(), "No message".to_string()),
    };

    let occurrences = if config.enable_stats {
        VALIDATION_STATS.record(message_severity);
        track_message(&message)
    } else {
        1
    };
    let repeat = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    let (severity_plain, severity_colored) = severity_label(message_severity);
    let kind = type_label(message_type);

    match &config.output {
        DebugOutput::Console => {
            eprint!("{}", console_line(&severity_colored, kind, &repeat, &message_id, &message));
        }
        DebugOutput::File(path) => {
            write_to_file(path, &file_line(severity_plain, kind, &repeat, &message_id, &message));
        }
        DebugOutput::Both(path) => {
            eprint!("{}", console_line(&severity_colored, kind, &repeat, &message_id, &message));
            write_to_file(path, &file_line(severity_plain, kind, &repeat, &message_id, &message));
        }
    }

    let is_error = message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);

    if config.panic_on_error && is_error {
        panic!("Validation error (strict mode)\nMessage ID: {}\nType: {}\nMessage: {}", message_id, kind, message);
    }

    if config.break_on_error && is_error {
        eprintln!(
            "\n{}\n  Context: {} [{}]\n  Message: {}\n",
            "BREAK ON VALIDATION ERROR - aborting".red().bold(),
            message_id.yellow(),
            kind.cyan(),
            message.white()
        );
        std::process::abort();
    }

    vk::FALSE
}

unsafe fn cstr_or(ptr: *const std::os::raw::c_char, fallback: &str) -> String {
    if ptr.is_null() {
        fallback.to_string()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn console_line(severity: &ColoredString, kind: &str, repeat: &str, id: &str, message: &str) -> String {
    format!(
        "{} {} [{}]{}\n  |- {}: {}\n  '- {}\n",
        "[VULKAN".bright_blue().bold(),
        format!("{}]", severity).bright_blue().bold(),
        kind.bright_black(),
        repeat.yellow(),
        "Message ID".bright_black(),
        id.white(),
        message.white()
    )
}

fn file_line(severity: &str, kind: &str, repeat: &str, id: &str, message: &str) -> String {
    format!("[VULKAN {}] [{}]{}\n  |- Message ID: {}\n  '- {}\n", severity, kind, repeat, id, message)
}

fn write_to_file(path: &str, message: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", message);
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
