//! CLI-specific progress handling for interchange-atlas
//!
//! Shows the running pipeline stage as a spinner on stderr.

use indicatif::{ProgressBar, ProgressStyle};
use interchange_atlas::Stage;
use std::time::Duration;

/// Creates a spinner for CLI display
pub fn create_stage_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb
}

/// Progress manager for the stages of one pipeline run
pub struct ProgressManager {
    pub pb: ProgressBar,
    stages_seen: usize,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(message: &str) -> Self {
        let pb = create_stage_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));

        // Print initial message to stderr
        eprintln!("{}", message);

        Self { pb, stages_seen: 0 }
    }

    /// Hidden manager for runs that must keep stderr clean
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
            stages_seen: 0,
        }
    }

    pub fn stage(&mut self, stage: Stage) {
        self.stages_seen += 1;
        self.pb.set_message(format!("[{}] {}", self.stages_seen, stage.label()));
    }

    pub fn finish(&self, count: usize) {
        self.pb.finish_with_message(format!("✅ {count} interchanges"));
    }
}
