//! Observers for sync progress
//!
//! The orchestrator emits every event through a [`SyncReporter`]; [`LogReporter`] renders them
//! as log lines. Events carry references and tags, never credential material.

use crate::config::RegistryPairSpec;
use crate::error::RegistryError;
use crate::logging::Logger;
use crate::registry::ImageReference;
use crate::selector::RejectedPattern;
use crate::sync::{PairState, RunSummary, SyncOutcome};

/// Receives orchestration events in the order they happen. Every method defaults to a no-op.
pub trait SyncReporter: Send + Sync {
    fn run_started(&self, _pairs: usize) {}

    fn credentials_resolved(&self, _dest_registry: &str, _anonymous: bool) {}

    fn pair_started(&self, _pair: &RegistryPairSpec) {}

    fn pair_state_changed(&self, _pair: &RegistryPairSpec, _state: PairState) {}

    fn tags_discovered(&self, _pair: &RegistryPairSpec, _tags: &[String]) {}

    fn pattern_rejected(&self, _pair: &RegistryPairSpec, _rejected: &RejectedPattern) {}

    fn tags_filtered(&self, _pair: &RegistryPairSpec, _remaining: &[String]) {}

    fn tags_selected(&self, _pair: &RegistryPairSpec, _selected: &[String]) {}

    fn tag_started(&self, _source: &ImageReference, _destination: &ImageReference) {}

    fn tag_finished(&self, _outcome: &SyncOutcome) {}

    fn pair_skipped(&self, _pair: &RegistryPairSpec, _error: &RegistryError) {}

    fn pair_completed(&self, _pair: &RegistryPairSpec, _synced: usize, _failed: usize) {}

    fn run_aborted(&self, _error: &RegistryError) {}

    fn run_completed(&self, _summary: &RunSummary) {}
}

/// Reporter that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl SyncReporter for NullReporter {}

/// Renders events through a [`Logger`]
#[derive(Debug, Clone)]
pub struct LogReporter {
    output: Logger,
}

impl LogReporter {
    pub fn new(output: Logger) -> Self {
        Self { output }
    }
}

impl SyncReporter for LogReporter {
    fn run_started(&self, pairs: usize) {
        self.output.section("Registry Sync");
        self.output
            .info(&format!("Configuration loaded: {} registry pair(s)", pairs));
    }

    fn credentials_resolved(&self, dest_registry: &str, anonymous: bool) {
        self.output.detail(&format!(
            "Credentials ready for {} ({})",
            dest_registry,
            if anonymous { "anonymous" } else { "authenticated" }
        ));
    }

    fn pair_started(&self, pair: &RegistryPairSpec) {
        self.output.subsection(&format!(
            "{} -> {}",
            pair.source_name(),
            pair.dest_name()
        ));
    }

    fn pair_state_changed(&self, pair: &RegistryPairSpec, state: PairState) {
        self.output
            .debug(&format!("{} is now {:?}", pair.source_name(), state));
    }

    fn tags_discovered(&self, pair: &RegistryPairSpec, tags: &[String]) {
        self.output.info(&format!(
            "Fetched {} tag(s) from {}",
            tags.len(),
            pair.source_name()
        ));
    }

    fn pattern_rejected(&self, pair: &RegistryPairSpec, rejected: &RejectedPattern) {
        self.output.warning(&format!(
            "Ignoring invalid exclude pattern '{}' for {}: {}",
            rejected.pattern,
            pair.source_name(),
            rejected.reason
        ));
    }

    fn tags_filtered(&self, pair: &RegistryPairSpec, remaining: &[String]) {
        self.output.info(&format!(
            "Filtered tags for {}: {:?}",
            pair.source_name(),
            remaining
        ));
    }

    fn tags_selected(&self, pair: &RegistryPairSpec, selected: &[String]) {
        if selected.is_empty() {
            self.output.info("No tags selected");
            return;
        }
        self.output.list(
            &format!("Selected tags (limit {})", pair.tag_limit),
            selected,
        );
    }

    fn tag_started(&self, source: &ImageReference, destination: &ImageReference) {
        self.output
            .step(&format!("Syncing {} -> {}", source, destination));
    }

    fn tag_finished(&self, outcome: &SyncOutcome) {
        let elapsed = self.output.format_duration(outcome.duration);
        match &outcome.error {
            None => self.output.success(&format!(
                "Synced {} in {}",
                outcome.destination, elapsed
            )),
            Some(error) => self.output.error(&format!(
                "Failed to sync tag {} ({} -> {}) after {}: {}",
                outcome.tag, outcome.source, outcome.destination, elapsed, error
            )),
        }
    }

    fn pair_skipped(&self, pair: &RegistryPairSpec, error: &RegistryError) {
        self.output.error(&format!(
            "Skipping {} -> {}: {}",
            pair.source_name(),
            pair.dest_name(),
            error
        ));
    }

    fn pair_completed(&self, pair: &RegistryPairSpec, synced: usize, failed: usize) {
        let message = format!(
            "Completed {} -> {}: {} synced, {} failed",
            pair.source_name(),
            pair.dest_name(),
            synced,
            failed
        );
        if failed == 0 {
            self.output.success(&message);
        } else {
            self.output.warning(&message);
        }
    }

    // The error itself is printed once by the caller that receives it
    fn run_aborted(&self, _error: &RegistryError) {
        self.output
            .warning("Sync aborted before any image was copied");
    }

    fn run_completed(&self, summary: &RunSummary) {
        self.output.summary_kv(
            "Sync Summary",
            &[
                ("Pairs", summary.pairs_total.to_string()),
                ("Pairs completed", summary.pairs_completed.to_string()),
                ("Pairs skipped", summary.pairs_skipped.to_string()),
                ("Tags synced", summary.tags_synced.to_string()),
                ("Tags failed", summary.tags_failed.to_string()),
                ("Duration", self.output.format_duration(summary.duration)),
            ],
        );
    }
}
