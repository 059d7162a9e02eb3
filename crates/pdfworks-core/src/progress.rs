//! Progress reporting for long-running document operations
//!
//! Operations emit [`ConversionProgress`] snapshots at fixed milestones. Events
//! are delivered synchronously to a [`ProgressSink`]; nothing is buffered.

use crate::error::PdfWorksError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

/// Immutable snapshot of an operation's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Percentage, 0-100
    pub progress: u8,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConversionProgress {
    pub fn new(progress: u8, status: ProgressStatus, message: Option<String>) -> Self {
        Self {
            progress: progress.min(100),
            status,
            message,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProgressStatus::Completed | ProgressStatus::Error
        )
    }
}

/// Receiver of progress events
pub trait ProgressSink {
    fn report(&mut self, event: ConversionProgress);
}

impl<F> ProgressSink for F
where
    F: FnMut(ConversionProgress),
{
    fn report(&mut self, event: ConversionProgress) {
        self(event)
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _event: ConversionProgress) {}
}

/// Per-operation reporter.
///
/// Keeps progress non-decreasing within one operation and emits at most one
/// terminal event (completed or error).
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    last: u8,
    finished: bool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            last: 0,
            finished: false,
        }
    }

    /// Last reported percentage
    pub fn current(&self) -> u8 {
        self.last
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn uploading(&mut self, progress: u8, message: &str) {
        self.emit(progress, ProgressStatus::Uploading, Some(message.to_string()));
    }

    pub fn processing(&mut self, progress: u8, message: &str) {
        self.emit(progress, ProgressStatus::Processing, Some(message.to_string()));
    }

    /// Report item `done` of `total` inside the percentage band `[from, to]`
    pub fn step(&mut self, done: usize, total: usize, from: u8, to: u8, message: &str) {
        let total = total.max(1);
        let span = to.saturating_sub(from) as usize;
        let progress = from as usize + span * done.min(total) / total;
        self.processing(progress as u8, message);
    }

    pub fn completed(&mut self, message: &str) {
        self.emit(100, ProgressStatus::Completed, Some(message.to_string()));
        self.finished = true;
    }

    pub fn failed(&mut self, error: &PdfWorksError) {
        if self.finished {
            return;
        }
        let event = ConversionProgress::new(
            self.last,
            ProgressStatus::Error,
            Some(error.to_string()),
        );
        self.sink.report(event);
        self.finished = true;
    }

    /// Run `op`, reporting a terminal error event if it fails.
    ///
    /// The error is returned unchanged; nothing is retried.
    pub fn run<T, F>(&mut self, op: F) -> Result<T, PdfWorksError>
    where
        F: FnOnce(&mut Self) -> Result<T, PdfWorksError>,
    {
        match op(self) {
            Ok(value) => {
                if !self.finished {
                    self.completed("Done");
                }
                Ok(value)
            }
            Err(e) => {
                self.failed(&e);
                Err(e)
            }
        }
    }

    fn emit(&mut self, progress: u8, status: ProgressStatus, message: Option<String>) {
        if self.finished {
            return;
        }
        let progress = progress.min(100).max(self.last);
        self.last = progress;
        self.sink
            .report(ConversionProgress::new(progress, status, message));
    }
}
