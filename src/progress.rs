// Progress bar for a diff run using indicatif.
// The engine reports whole-run percentages, so one bar covers all phases.

use indicatif::{ProgressBar, ProgressStyle};

pub struct RunProgress {
    bar: Option<ProgressBar>,
}

impl RunProgress {
    // If enabled=false, no bar is drawn.
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(100);
            bar.set_style(progress_style());
            Some(bar)
        } else {
            None
        };
        Self { bar }
    }

    pub fn status(&self, message: &str, progress: u8) {
        if let Some(bar) = &self.bar {
            bar.set_prefix(message.to_string());
            bar.set_position(progress as u64);
        }
    }

    pub fn set(&self, value: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(value as u64);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }

    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:30} [{bar:60}] {pos:>3}% {elapsed_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█ ")
}
