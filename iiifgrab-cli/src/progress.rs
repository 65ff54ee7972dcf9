//! Terminal progress rendering.

use iiifgrab::engine::ProgressObserver;
use indicatif::{ProgressBar, ProgressStyle};

/// Renders engine progress as an indicatif bar.
///
/// The bar length is set lazily from the first callback, so one bar
/// instance works for both single-request and tiled plans.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Create a bar for one image download.
    pub fn new() -> Self {
        let bar = ProgressBar::no_length();
        bar.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} tiles ({elapsed})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    /// Finish and clear the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarProgress {
    fn on_tile(&self, completed: usize, total: usize) {
        if self.bar.length().is_none() {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(completed as u64);
    }
}
