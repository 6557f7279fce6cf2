use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

use crate::transfer::Phase;

/// Receives read-side progress of a transfer. Batches are reported as they
/// are read, so the numbers track reader throughput.
pub trait ProgressSink {
    fn begin(&self, phase: Phase, total: u64);
    fn advance(&self, phase: Phase, batch_len: usize);
    fn finish(&self, phase: Phase);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn begin(&self, _phase: Phase, _total: u64) {}
    fn advance(&self, _phase: Phase, _batch_len: usize) {}
    fn finish(&self, _phase: Phase) {}
}

/// One terminal progress bar per phase, drawn on stderr.
pub struct ConsoleProgress {
    style: ProgressStyle,
    nodes: Mutex<Option<ProgressBar>>,
    relationships: Mutex<Option<ProgressBar>>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(
            "[{bar:50}] {percent:>3}% {msg} copied ({pos}/{len})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        Self {
            style,
            nodes: Mutex::new(None),
            relationships: Mutex::new(None),
        }
    }

    fn slot(&self, phase: Phase) -> &Mutex<Option<ProgressBar>> {
        match phase {
            Phase::Nodes => &self.nodes,
            Phase::Relationships => &self.relationships,
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn begin(&self, phase: Phase, total: u64) {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(self.style.clone());
        bar.set_message(phase.title());
        *self.slot(phase).lock() = Some(bar);
    }

    fn advance(&self, phase: Phase, batch_len: usize) {
        if let Some(bar) = self.slot(phase).lock().as_ref() {
            bar.inc(batch_len as u64);
        }
    }

    fn finish(&self, phase: Phase) {
        if let Some(bar) = self.slot(phase).lock().take() {
            bar.finish();
        }
    }
}
