//! Per-job logger.
//!
//! Each conform run gets its own logger that:
//! - Forwards every line to `tracing` tagged with the job name
//! - Optionally writes a dedicated log file
//! - Optionally hands lines to a caller-supplied sink
//! - Keeps a tail buffer of engine output for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, LogSink, MessagePrefix};

/// Per-job logger.
pub struct JobLogger {
    job_name: String,
    log_path: Option<PathBuf>,
    file_writer: Mutex<Option<BufWriter<File>>>,
    sink: Option<LogSink>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<Option<u32>>,
}

impl JobLogger {
    /// Create a logger that only forwards to `tracing` (and the sink).
    pub fn new(job_name: impl Into<String>, config: LogConfig, sink: Option<LogSink>) -> Self {
        let error_tail = config.error_tail;
        Self {
            job_name: job_name.into(),
            log_path: None,
            file_writer: Mutex::new(None),
            sink,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(error_tail)),
            last_progress: Mutex::new(None),
        }
    }

    /// Create a logger that also writes `<log_dir>/<job_name>.log`.
    pub fn with_file(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        sink: Option<LogSink>,
    ) -> std::io::Result<Self> {
        let mut logger = Self::new(job_name, config, sink);
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&logger.job_name)));
        let file = File::create(&log_path)?;

        logger.file_writer = Mutex::new(Some(BufWriter::new(file)));
        logger.log_path = Some(log_path);
        Ok(logger)
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Path of the job log file, if one is written.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        self.output(level, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log an engine invocation.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Debug, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    pub fn validation(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Validation.format(message));
    }

    /// Log progress, at most once per `progress_step` in compact mode.
    ///
    /// Returns true if the progress was logged.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            if let Some(previous) = *last {
                if percent / step <= previous / step && percent < 100 {
                    return false;
                }
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record engine output, one line at a time.
    ///
    /// Lines always go to the tail buffer; outside compact mode they are
    /// also logged at debug level.
    pub fn output_lines(&self, output: &str) {
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            {
                let mut buffer = self.tail_buffer.lock();
                if buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                buffer.push_back(line.to_string());
            }

            if !self.config.compact {
                self.log(LogLevel::Debug, line);
            }
        }
    }

    /// Emit the tail buffer at error level (after a failure).
    pub fn show_tail(&self, header: &str) {
        let lines = self.get_tail();
        if lines.is_empty() {
            return;
        }

        self.output(LogLevel::Error, &format!("[{}/tail]", header));
        for line in &lines {
            self.output(LogLevel::Error, line);
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and close the job log file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn output(&self, level: LogLevel, message: &str) {
        let job = self.job_name.as_str();
        match level {
            LogLevel::Trace => tracing::trace!(job = %job, "{}", message),
            LogLevel::Debug => tracing::debug!(job = %job, "{}", message),
            LogLevel::Info => tracing::info!(job = %job, "{}", message),
            LogLevel::Warn => tracing::warn!(job = %job, "{}", message),
            LogLevel::Error => tracing::error!(job = %job, "{}", message),
        }

        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = if self.config.show_timestamps {
                writeln!(writer, "[{}] {}", Local::now().format("%H:%M:%S"), message)
            } else {
                writeln!(writer, "{}", message)
            };
        }

        if let Some(ref sink) = self.sink {
            sink(level, message);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Builder for creating JobLogger with fluent API.
pub struct JobLoggerBuilder {
    job_name: String,
    log_dir: Option<PathBuf>,
    config: LogConfig,
    sink: Option<LogSink>,
}

impl JobLoggerBuilder {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            log_dir: None,
            config: LogConfig::default(),
            sink: None,
        }
    }

    /// Also write a log file into `dir`.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    pub fn sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> std::io::Result<JobLogger> {
        match self.log_dir {
            Some(dir) => JobLogger::with_file(self.job_name, dir, self.config, self.sink),
            None => Ok(JobLogger::new(self.job_name, self.config, self.sink)),
        }
    }
}
