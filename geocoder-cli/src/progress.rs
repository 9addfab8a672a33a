//! A thin progress-bar wrapper (out of scope for the core engine per
//! spec.md §1, needed to run the binary end-to-end per SPEC_FULL.md §2).
//! Grounded on `indicatif`'s use elsewhere in the retrieved example pack for
//! CLI batch jobs over large inputs.

use indicatif::{ProgressBar, ProgressStyle};

pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        ProgressReporter { bar }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
