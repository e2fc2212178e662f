//! Progress reporting seam between the engine and whatever front end
//! is driving it. All methods default to no-ops so a reporter only
//! implements the events it cares about.

use crate::engine::Phase;

pub trait ProgressReporter: Send + Sync {
    fn on_phase_started(&self, _phase: Phase) {}

    fn on_phase_completed(&self, _phase: Phase) {}

    fn on_phase_failed(&self, _phase: Phase, _error: &str) {}

    /// Progress within the current phase. Reset to 0 when the phase is
    /// entered and driven to 100 when it completes.
    fn on_phase_progress(&self, _phase: Phase, _percent: u8) {}

    /// Overall progress in percent plus a short status line.
    fn on_progress(&self, _percent: u8, _message: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
