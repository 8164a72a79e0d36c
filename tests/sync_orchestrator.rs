//! Sync engine behaviour against an in-process backend and identity provider

use async_trait::async_trait;
use registry_mirror::config::{RegistryPairSpec, SecretEntry, SecretKind, Secrets};
use registry_mirror::credentials::{CredentialResolver, IdentityExchanger};
use registry_mirror::error::{RegistryError, Result};
use registry_mirror::logging::Logger;
use registry_mirror::registry::ImageReference;
use registry_mirror::selector::{RejectedPattern, TagOrdering};
use registry_mirror::sync::{PairState, SyncOrchestrator, SyncReporter};
use registry_mirror::transfer::{AuthContext, CopySummary, TransferBackend, TrustPolicy};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
struct CopyCall {
    source: String,
    destination: String,
    source_auth: AuthContext,
    destination_auth: AuthContext,
    policy: TrustPolicy,
}

#[derive(Default)]
struct FakeBackend {
    tags: HashMap<String, Vec<String>>,
    failing_copies: Vec<String>,
    copies: Mutex<Vec<CopyCall>>,
    listings: Mutex<Vec<(String, AuthContext)>>,
}

impl FakeBackend {
    fn with_tags(mut self, source: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(source.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    fn failing_copy(mut self, source_reference: &str) -> Self {
        self.failing_copies.push(source_reference.to_string());
        self
    }

    fn copied(&self) -> Vec<String> {
        self.copies
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.source.clone())
            .collect()
    }
}

#[async_trait]
impl TransferBackend for FakeBackend {
    async fn list_tags(
        &self,
        registry: &str,
        repository: &str,
        auth: &AuthContext,
    ) -> Result<Vec<String>> {
        let name = format!("{}/{}", registry, repository);
        self.listings
            .lock()
            .unwrap()
            .push((name.clone(), auth.clone()));
        self.tags
            .get(&name)
            .cloned()
            .ok_or_else(|| RegistryError::Registry(format!("{} is unreachable", name)))
    }

    async fn copy_image(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
        source_auth: &AuthContext,
        destination_auth: &AuthContext,
        policy: TrustPolicy,
    ) -> Result<CopySummary> {
        self.copies.lock().unwrap().push(CopyCall {
            source: source.to_string(),
            destination: destination.to_string(),
            source_auth: source_auth.clone(),
            destination_auth: destination_auth.clone(),
            policy,
        });

        if self.failing_copies.contains(&source.to_string()) {
            return Err(RegistryError::Transfer(format!("copy of {} failed", source)));
        }
        Ok(CopySummary {
            manifest_digest: "sha256:feed".to_string(),
            ..CopySummary::default()
        })
    }
}

struct FakeExchanger {
    fail: bool,
    calls: Mutex<usize>,
}

impl FakeExchanger {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl IdentityExchanger for FakeExchanger {
    async fn exchange(&self, _credential_material: &str, _scope: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            Err(RegistryError::Auth("provider rejected the assertion".to_string()))
        } else {
            Ok("short-lived-token".to_string())
        }
    }
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl SyncReporter for RecordingReporter {
    fn pair_state_changed(&self, pair: &RegistryPairSpec, state: PairState) {
        self.push(format!("state {} {:?}", pair.source_name(), state));
    }

    fn pattern_rejected(&self, _pair: &RegistryPairSpec, rejected: &RejectedPattern) {
        self.push(format!("rejected {}", rejected.pattern));
    }

    fn tags_filtered(&self, pair: &RegistryPairSpec, remaining: &[String]) {
        self.push(format!("filtered {} {:?}", pair.source_name(), remaining));
    }

    fn tags_selected(&self, pair: &RegistryPairSpec, selected: &[String]) {
        self.push(format!("selected {} {:?}", pair.source_name(), selected));
    }

    fn pair_skipped(&self, pair: &RegistryPairSpec, error: &RegistryError) {
        self.push(format!("skipped {}: {}", pair.source_name(), error));
    }

    fn run_aborted(&self, _error: &RegistryError) {
        self.push("aborted".to_string());
    }
}

fn pair(source: &str, dest_registry: &str, limit: usize, exclude: &[&str]) -> RegistryPairSpec {
    let (source_registry, source_repository) = source.split_once('/').unwrap();
    RegistryPairSpec {
        source_registry: source_registry.to_string(),
        source_repository: source_repository.to_string(),
        dest_registry: dest_registry.to_string(),
        dest_repository: format!("mirror/{}", source_repository),
        tag_limit: limit,
        exclude_patterns: exclude.iter().map(|p| p.to_string()).collect(),
        tag_ordering: TagOrdering::Lexicographic,
    }
}

fn orchestrator(
    backend: FakeBackend,
    exchanger: Arc<FakeExchanger>,
    reporter: Arc<RecordingReporter>,
) -> SyncOrchestrator<FakeBackend> {
    let resolver = CredentialResolver::new(exchanger, Logger::new_quiet());
    SyncOrchestrator::new(backend, resolver, reporter)
}

fn basic_secret(registry: &str) -> SecretEntry {
    SecretEntry {
        dest_registry: registry.to_string(),
        kind: SecretKind::Generic,
        username: Some("robot".to_string()),
        password: Some("s3cret".to_string()),
        service_account_key: None,
    }
}

#[tokio::test]
async fn test_selection_and_skipped_discovery() {
    let backend = FakeBackend::default().with_tags("src.io/app", &["v1", "v2", "v3"]);
    let reporter = Arc::new(RecordingReporter::default());
    let orchestrator = orchestrator(backend, FakeExchanger::new(false), reporter.clone());

    let specs = vec![
        pair("src.io/app", "dst.io", 1, &["^v1$"]),
        pair("down.io/other", "dst.io", 5, &[]),
    ];
    let summary = orchestrator
        .sync_all(&specs, &Secrets::default())
        .await
        .unwrap();

    assert_eq!(orchestrator.backend().copied(), vec!["src.io/app:v3"]);
    assert_eq!(summary.pairs_completed, 1);
    assert_eq!(summary.pairs_skipped, 1);
    assert_eq!(summary.tags_synced, 1);
    assert_eq!(summary.pairs[0].selected, vec!["v3"]);
    assert_eq!(summary.pairs[1].state, PairState::Skipped);

    let expected = "Registry error: listing tags of down.io/other: down.io/other is unreachable";
    let discovery_error = summary.pairs[1].discovery_error.as_ref().unwrap();
    assert!(matches!(discovery_error, RegistryError::Registry(_)));
    assert_eq!(discovery_error.to_string(), expected);

    let events = reporter.events();
    assert!(events.contains(&format!("skipped down.io/other: {}", expected)));
    assert!(events.contains(&"filtered src.io/app [\"v2\", \"v3\"]".to_string()));
    assert!(events.contains(&"selected src.io/app [\"v3\"]".to_string()));
    assert!(events.contains(&"state src.io/app Done".to_string()));
}

#[tokio::test]
async fn test_copy_failure_does_not_stop_other_tags_or_pairs() {
    let backend = FakeBackend::default()
        .with_tags("src.io/a", &["v1", "v2", "v3"])
        .with_tags("src.io/b", &["1.0"])
        .failing_copy("src.io/a:v2");
    let orchestrator = orchestrator(
        backend,
        FakeExchanger::new(false),
        Arc::new(RecordingReporter::default()),
    );

    let specs = vec![
        pair("src.io/a", "dst.io", 3, &[]),
        pair("src.io/b", "dst.io", 3, &[]),
    ];
    let summary = orchestrator
        .sync_all(&specs, &Secrets::default())
        .await
        .unwrap();

    assert_eq!(
        orchestrator.backend().copied(),
        vec!["src.io/a:v3", "src.io/a:v2", "src.io/a:v1", "src.io/b:1.0"]
    );
    assert_eq!(summary.tags_synced, 3);
    assert_eq!(summary.tags_failed, 1);

    let failed: Vec<_> = summary.outcomes().filter(|o| !o.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].tag, "v2");
    assert_eq!(failed[0].destination.to_string(), "dst.io/mirror/a:v2");
    assert!(matches!(failed[0].error, Some(RegistryError::Transfer(_))));
}

#[tokio::test]
async fn test_exchange_failure_aborts_before_any_copy() {
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(b"{\"client_email\": \"x\"}").unwrap();

    let backend = FakeBackend::default()
        .with_tags("src.io/a", &["v1"])
        .with_tags("src.io/b", &["v1"]);
    let reporter = Arc::new(RecordingReporter::default());
    let exchanger = FakeExchanger::new(true);
    let orchestrator = orchestrator(backend, exchanger.clone(), reporter.clone());

    let secrets = Secrets {
        secrets: vec![SecretEntry {
            dest_registry: "gcr.io".to_string(),
            kind: SecretKind::TokenExchange,
            username: None,
            password: None,
            service_account_key: Some(key_file.path().to_string_lossy().into_owned()),
        }],
    };
    // The failing registry is only needed by the second pair
    let specs = vec![
        pair("src.io/a", "dst.io", 1, &[]),
        pair("src.io/b", "gcr.io", 1, &[]),
    ];

    let err = orchestrator.sync_all(&specs, &secrets).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(*exchanger.calls.lock().unwrap(), 1);
    assert!(orchestrator.backend().copied().is_empty());
    assert!(orchestrator.backend().listings.lock().unwrap().is_empty());

    let events = reporter.events();
    assert!(events.contains(&"aborted".to_string()));
    assert!(events.contains(&"state src.io/b Fatal".to_string()));
}

#[tokio::test]
async fn test_destination_auth_follows_matching_secret() {
    let backend = FakeBackend::default()
        .with_tags("src.io/a", &["v1"])
        .with_tags("src.io/b", &["v1"]);
    let orchestrator = orchestrator(
        backend,
        FakeExchanger::new(false),
        Arc::new(RecordingReporter::default()),
    );

    let secrets = Secrets {
        secrets: vec![basic_secret("private.io")],
    };
    let specs = vec![
        pair("src.io/a", "private.io", 1, &[]),
        pair("src.io/b", "public.io", 1, &[]),
    ];
    orchestrator.sync_all(&specs, &secrets).await.unwrap();

    let copies = orchestrator.backend().copies.lock().unwrap().clone();
    assert_eq!(copies.len(), 2);
    assert_eq!(
        copies[0].destination_auth,
        AuthContext::Basic {
            username: "robot".to_string(),
            password: "s3cret".to_string(),
        }
    );
    assert_eq!(copies[1].destination_auth, AuthContext::Anonymous);
    assert!(copies.iter().all(|c| c.source_auth == AuthContext::Anonymous));
    assert!(copies
        .iter()
        .all(|c| c.policy == TrustPolicy::InsecureAcceptAnything));

    let listings = orchestrator.backend().listings.lock().unwrap().clone();
    assert!(listings.iter().all(|(_, auth)| auth.is_anonymous()));
}

#[tokio::test]
async fn test_token_exchange_credentials_reach_backend() {
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(b"{}").unwrap();

    let backend = FakeBackend::default()
        .with_tags("src.io/a", &["v1"])
        .with_tags("src.io/b", &["v2"]);
    let exchanger = FakeExchanger::new(false);
    let orchestrator = orchestrator(
        backend,
        exchanger.clone(),
        Arc::new(RecordingReporter::default()),
    );

    let secrets = Secrets {
        secrets: vec![SecretEntry {
            dest_registry: "gcr.io".to_string(),
            kind: SecretKind::TokenExchange,
            username: None,
            password: None,
            service_account_key: Some(key_file.path().to_string_lossy().into_owned()),
        }],
    };
    let specs = vec![
        pair("src.io/a", "gcr.io", 1, &[]),
        pair("src.io/b", "gcr.io", 1, &[]),
    ];
    orchestrator.sync_all(&specs, &secrets).await.unwrap();

    // Memoised per destination registry for the run
    assert_eq!(*exchanger.calls.lock().unwrap(), 1);
    let copies = orchestrator.backend().copies.lock().unwrap().clone();
    assert!(copies.iter().all(|c| c.destination_auth
        == AuthContext::Basic {
            username: "oauth2accesstoken".to_string(),
            password: "short-lived-token".to_string(),
        }));
}

#[tokio::test]
async fn test_zero_limit_and_invalid_pattern() {
    let backend = FakeBackend::default()
        .with_tags("src.io/a", &["v1", "v2"])
        .with_tags("src.io/b", &["v1", "v2"]);
    let reporter = Arc::new(RecordingReporter::default());
    let orchestrator = orchestrator(backend, FakeExchanger::new(false), reporter.clone());

    let specs = vec![
        pair("src.io/a", "dst.io", 0, &[]),
        pair("src.io/b", "dst.io", 5, &["(unclosed", "^v1$"]),
    ];
    let summary = orchestrator
        .sync_all(&specs, &Secrets::default())
        .await
        .unwrap();

    assert_eq!(orchestrator.backend().copied(), vec!["src.io/b:v2"]);
    assert_eq!(summary.pairs_completed, 2);
    assert!(summary.pairs[0].selected.is_empty());
    assert!(reporter.events().contains(&"rejected (unclosed".to_string()));
}

#[tokio::test]
async fn test_reject_policy_is_passed_to_backend() {
    let backend = FakeBackend::default().with_tags("src.io/a", &["v1"]);
    let orchestrator = orchestrator(
        backend,
        FakeExchanger::new(false),
        Arc::new(RecordingReporter::default()),
    )
    .with_trust_policy(TrustPolicy::Reject);

    orchestrator
        .sync_all(&[pair("src.io/a", "dst.io", 1, &[])], &Secrets::default())
        .await
        .unwrap();

    let copies = orchestrator.backend().copies.lock().unwrap().clone();
    assert_eq!(copies[0].policy, TrustPolicy::Reject);
}
