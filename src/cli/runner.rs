//! Runner wiring the configuration files, the HTTP backend and the sync engine together

use crate::cli::args::{Args, Command};
use crate::cli::report;
use crate::config::{
    DEFAULT_CONFIG_FILE, DEFAULT_SECRETS_FILE, DEFAULT_TAG_REPORT_FILE, MirrorConfig, Secrets,
    TagReportConfig,
};
use crate::credentials::{CredentialResolver, ServiceAccountExchanger};
use crate::error::Result;
use crate::logging::Logger;
use crate::sync::{LogReporter, SyncOrchestrator};
use crate::transfer::HttpTransferBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    pub fn logger(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<()> {
        match self.args.command.clone().unwrap_or_default() {
            Command::Sync { config, secrets } => {
                let config = config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                let secrets = secrets.unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_FILE));
                self.run_sync(&config, &secrets).await
            }
            Command::ListTags { config, max } => {
                let config = config.unwrap_or_else(|| PathBuf::from(DEFAULT_TAG_REPORT_FILE));
                self.run_list_tags(&config, max).await
            }
        }
    }

    async fn run_sync(&self, config_path: &Path, secrets_path: &Path) -> Result<()> {
        let config = MirrorConfig::load(config_path)?;
        self.output
            .verbose(&format!("Loaded configuration from {}", config_path.display()));
        let secrets = Secrets::load(secrets_path)?;
        self.output.verbose(&format!(
            "Loaded {} secret entr{} from {}",
            secrets.secrets.len(),
            if secrets.secrets.len() == 1 { "y" } else { "ies" },
            secrets_path.display()
        ));

        let backend = HttpTransferBackend::new(self.output.clone())
            .with_insecure_registries(config.insecure_registries.clone());
        let exchanger = Arc::new(ServiceAccountExchanger::new(self.output.clone())?);
        let resolver = CredentialResolver::new(exchanger, self.output.clone());
        let reporter = Arc::new(LogReporter::new(self.output.clone()));

        let orchestrator = SyncOrchestrator::new(backend, resolver, reporter)
            .with_trust_policy(config.trust_policy);
        orchestrator.sync_all(&config.registries, &secrets).await?;
        Ok(())
    }

    async fn run_list_tags(&self, config_path: &Path, max: Option<usize>) -> Result<()> {
        let config = TagReportConfig::load(config_path)?;
        let max = max.unwrap_or(config.max);

        self.output.section("Latest Tags");
        self.output.verbose(&format!(
            "Listing up to {} tag(s) per image from {}",
            max,
            config_path.display()
        ));

        let backend = HttpTransferBackend::new(self.output.clone());
        let entries = report::collect(&backend, &config, max).await;
        report::print(&entries, &self.output);
        Ok(())
    }
}
