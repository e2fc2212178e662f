use indicatif::{ProgressBar, ProgressStyle};
use reorg_core::{Phase, ProgressReporter};
use std::sync::Mutex;

/// CLI progress reporter using indicatif.
///
/// One spinner per phase; the overall percentage and phase name travel
/// in the spinner message.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_phase_started(&self, phase: Phase) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(format!("{}...", phase));
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_phase_progress(&self, phase: Phase, percent: u8) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_message(format!("{}... {}%", phase, percent));
        }
    }

    fn on_progress(&self, percent: u8, message: &str) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_message(format!("[{:>3}%] {}", percent, message));
        }
    }

    fn on_phase_completed(&self, phase: Phase) {
        self.finish_bar();
        eprintln!("  \x1b[32m✓\x1b[0m {}", phase);
    }

    fn on_phase_failed(&self, phase: Phase, error: &str) {
        self.finish_bar();
        eprintln!("  \x1b[31m✗\x1b[0m {}: {}", phase, error);
    }
}
