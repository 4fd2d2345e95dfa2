use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use super::styling::{failure, heading, phase_active, phase_done};

/// Progress for the two phases of a run: listing pipelines, then migrating them.
pub struct MigrationProgress {
    pb: ProgressBar,
}

impl MigrationProgress {
    pub fn start_listing() -> Self {
        eprintln!("{}  {}", heading("⚙️"), heading("Phases"));
        let pb = create_spinner(phase_active("Phase 1/2: Retrieving pipelines").to_string());
        Self { pb }
    }

    pub fn finish_listing_start_migration(self, pending: usize, skipped: usize) -> Self {
        self.pb.finish_with_message(
            phase_done(format!(
                "Phase 1/2: Retrieved pipelines ({pending} to migrate, {skipped} already migrated)"
            ))
            .to_string(),
        );

        let pb = ProgressBar::new(pending as u64);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:30}] {pos}/{len} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(phase_active("Phase 2/2: Migrating logs").to_string());
        Self { pb }
    }

    pub fn pipeline_migrated(&self, pipeline: &str) {
        self.pb.inc(1);
        self.pb.println(format!("    {pipeline}"));
    }

    pub fn finish(self) {
        self.pb
            .finish_with_message(phase_done("Phase 2/2: Migrated logs").to_string());
        eprintln!();
    }

    pub fn abandon(self) {
        self.pb
            .abandon_with_message(failure("Migration aborted").to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
