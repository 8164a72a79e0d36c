//! Registry sync orchestration
//!
//! [`SyncOrchestrator::sync_all`] runs every registry pair strictly in sequence:
//!
//! 1. credentials for every destination registry are resolved up front and memoised for the run;
//!    a failed token exchange aborts before anything is copied
//! 2. source tags are listed anonymously; a listing failure skips the pair
//! 3. tags are filtered and selected per pair
//! 4. each selected tag is copied; a failed copy is reported and the loop moves on
//!
//! Nothing is retried.

pub mod reporter;

pub use reporter::{LogReporter, NullReporter, SyncReporter};

use crate::config::{RegistryPairSpec, Secrets};
use crate::credentials::{CredentialResolver, ResolvedCredential};
use crate::error::{RegistryError, Result};
use crate::registry::ImageReference;
use crate::selector::TagSelector;
use crate::transfer::{AuthContext, CopySummary, TransferBackend, TrustPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of one registry pair within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Pending,
    CredentialsResolved,
    TagsDiscovered,
    Syncing,
    Done,
    /// Tag discovery failed
    Skipped,
    /// Credential resolution failed; the run stops
    Fatal,
}

/// Result of copying one tag
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub tag: String,
    pub source: ImageReference,
    pub destination: ImageReference,
    pub success: bool,
    pub error: Option<RegistryError>,
    pub duration: Duration,
    pub copied: Option<CopySummary>,
}

impl SyncOutcome {
    fn new(
        tag: &str,
        source: ImageReference,
        destination: ImageReference,
        result: Result<CopySummary>,
        duration: Duration,
    ) -> Self {
        let (copied, error) = match result {
            Ok(summary) => (Some(summary), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            tag: tag.to_string(),
            source,
            destination,
            success: error.is_none(),
            error,
            duration,
            copied,
        }
    }
}

/// What happened to one registry pair
#[derive(Debug, Clone)]
pub struct PairReport {
    pub source: String,
    pub destination: String,
    pub state: PairState,
    pub discovery_error: Option<RegistryError>,
    pub selected: Vec<String>,
    pub outcomes: Vec<SyncOutcome>,
}

impl PairReport {
    fn new(spec: &RegistryPairSpec) -> Self {
        Self {
            source: spec.source_name(),
            destination: spec.dest_name(),
            state: PairState::Pending,
            discovery_error: None,
            selected: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn synced(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// In-memory totals for one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pairs_total: usize,
    pub pairs_completed: usize,
    pub pairs_skipped: usize,
    pub tags_synced: usize,
    pub tags_failed: usize,
    pub duration: Duration,
    pub pairs: Vec<PairReport>,
}

impl RunSummary {
    fn record(&mut self, report: PairReport) {
        match report.state {
            PairState::Skipped => self.pairs_skipped += 1,
            PairState::Done => self.pairs_completed += 1,
            _ => {}
        }
        self.tags_synced += report.synced();
        self.tags_failed += report.failed();
        self.pairs.push(report);
    }

    /// Every outcome of the run in the order it happened
    pub fn outcomes(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.pairs.iter().flat_map(|pair| pair.outcomes.iter())
    }
}

pub struct SyncOrchestrator<B: TransferBackend> {
    backend: B,
    resolver: CredentialResolver,
    reporter: Arc<dyn SyncReporter>,
    trust_policy: TrustPolicy,
}

impl<B: TransferBackend> SyncOrchestrator<B> {
    pub fn new(backend: B, resolver: CredentialResolver, reporter: Arc<dyn SyncReporter>) -> Self {
        Self {
            backend,
            resolver,
            reporter,
            trust_policy: TrustPolicy::default(),
        }
    }

    pub fn with_trust_policy(mut self, trust_policy: TrustPolicy) -> Self {
        self.trust_policy = trust_policy;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Sync every pair. Only a fatal credential failure returns `Err`.
    pub async fn sync_all(
        &self,
        specs: &[RegistryPairSpec],
        secrets: &Secrets,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        self.reporter.run_started(specs.len());

        let credentials = match self.resolve_all(specs, secrets).await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.reporter.run_aborted(&e);
                return Err(e);
            }
        };

        let mut summary = RunSummary {
            pairs_total: specs.len(),
            ..RunSummary::default()
        };

        for spec in specs {
            let credential = credentials
                .get(&spec.dest_registry)
                .cloned()
                .unwrap_or_else(ResolvedCredential::anonymous);
            let report = self.sync_pair(spec, &credential).await;
            summary.record(report);
        }

        summary.duration = started.elapsed();
        self.reporter.run_completed(&summary);
        Ok(summary)
    }

    async fn resolve_all(
        &self,
        specs: &[RegistryPairSpec],
        secrets: &Secrets,
    ) -> Result<HashMap<String, ResolvedCredential>> {
        let mut memo: HashMap<String, ResolvedCredential> = HashMap::new();

        for spec in specs {
            if memo.contains_key(&spec.dest_registry) {
                continue;
            }

            match self.resolver.resolve(&spec.dest_registry, secrets).await {
                Ok(credential) => {
                    self.reporter
                        .credentials_resolved(&spec.dest_registry, credential.is_anonymous());
                    memo.insert(spec.dest_registry.clone(), credential);
                }
                Err(e) => {
                    self.reporter.pair_state_changed(spec, PairState::Fatal);
                    return Err(e);
                }
            }
        }

        Ok(memo)
    }

    async fn sync_pair(
        &self,
        spec: &RegistryPairSpec,
        credential: &ResolvedCredential,
    ) -> PairReport {
        let mut report = PairReport::new(spec);
        self.reporter.pair_started(spec);
        self.transition(spec, &mut report, PairState::CredentialsResolved);

        let tags = match self
            .backend
            .list_tags(
                &spec.source_registry,
                &spec.source_repository,
                &AuthContext::Anonymous,
            )
            .await
        {
            Ok(tags) => tags,
            Err(e) => {
                let e = e.context(&format!("listing tags of {}", spec.source_name()));
                self.reporter.pair_skipped(spec, &e);
                self.transition(spec, &mut report, PairState::Skipped);
                report.discovery_error = Some(e);
                return report;
            }
        };
        self.transition(spec, &mut report, PairState::TagsDiscovered);
        self.reporter.tags_discovered(spec, &tags);

        let selector = TagSelector::new(&spec.exclude_patterns).with_ordering(spec.tag_ordering);
        for rejected in selector.rejected_patterns() {
            self.reporter.pattern_rejected(spec, rejected);
        }
        let remaining = selector.filter(&tags);
        self.reporter.tags_filtered(spec, &remaining);
        report.selected = selector.order(remaining, spec.tag_limit);
        self.reporter.tags_selected(spec, &report.selected);

        self.transition(spec, &mut report, PairState::Syncing);
        let destination_auth = credential.auth_context();
        for tag in report.selected.clone() {
            let outcome = self.sync_tag(spec, &tag, &destination_auth).await;
            report.outcomes.push(outcome);
        }

        self.transition(spec, &mut report, PairState::Done);
        self.reporter
            .pair_completed(spec, report.synced(), report.failed());
        report
    }

    async fn sync_tag(
        &self,
        spec: &RegistryPairSpec,
        tag: &str,
        destination_auth: &AuthContext,
    ) -> SyncOutcome {
        let source = ImageReference::new(&spec.source_registry, &spec.source_repository, tag);
        let destination = ImageReference::new(&spec.dest_registry, &spec.dest_repository, tag);
        self.reporter.tag_started(&source, &destination);

        let started = Instant::now();
        let result = self
            .backend
            .copy_image(
                &source,
                &destination,
                &AuthContext::Anonymous,
                destination_auth,
                self.trust_policy,
            )
            .await;

        let outcome = SyncOutcome::new(tag, source, destination, result, started.elapsed());
        self.reporter.tag_finished(&outcome);
        outcome
    }

    fn transition(&self, spec: &RegistryPairSpec, report: &mut PairReport, state: PairState) {
        report.state = state;
        self.reporter.pair_state_changed(spec, state);
    }
}
