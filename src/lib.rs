//! Registry Mirror Library
//!
//! Mirrors a bounded, filtered set of container image tags from source repositories into
//! destination registries. The sync engine (credential resolution, tag selection and the
//! per-pair loop) is generic over [`transfer::TransferBackend`]; [`transfer::HttpTransferBackend`]
//! implements it on top of the Docker Registry HTTP API v2.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod digest;
pub mod error;
pub mod logging;
pub mod registry;
pub mod selector;
pub mod sync;
pub mod transfer;

pub use config::{MirrorConfig, RegistryPairSpec, SecretEntry, SecretKind, Secrets};
pub use credentials::{CredentialResolver, IdentityExchanger, ResolvedCredential};
pub use error::{RegistryError, Result};
pub use logging::Logger;
pub use selector::{TagOrdering, TagSelector};
pub use sync::{RunSummary, SyncOrchestrator, SyncOutcome, SyncReporter};
pub use transfer::{AuthContext, TransferBackend, TrustPolicy};
