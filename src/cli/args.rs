//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const ENV_CONFIG: &str = "REGISTRY_MIRROR_CONFIG";
pub const ENV_SECRETS: &str = "REGISTRY_MIRROR_SECRETS";
pub const ENV_VERBOSE: &str = "REGISTRY_MIRROR_VERBOSE";

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-mirror")]
#[command(about = "Mirror a bounded, filtered set of image tags between container registries")]
#[command(version)]
pub struct Args {
    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,

    /// Defaults to `sync` with the default file locations
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Copy the selected tags of every configured registry pair
    Sync {
        #[arg(
            long = "config",
            short = 'c',
            help = "Registry pairs file [default: registries.yaml]"
        )]
        config: Option<PathBuf>,

        #[arg(
            long = "secrets",
            short = 's',
            help = "Destination secrets file [default: secrets.yaml]"
        )]
        secrets: Option<PathBuf>,
    },

    /// Print the latest tags of the images listed in a report file
    ListTags {
        #[arg(long = "config", short = 'c', help = "Tag report file [default: config.yaml]")]
        config: Option<PathBuf>,

        #[arg(long = "max", short = 'm', help = "Tags per image, overrides `max` from the file")]
        max: Option<usize>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Sync {
            config: None,
            secrets: None,
        }
    }
}

impl Args {
    /// Parse the command line, then fill unset values from the environment
    pub fn from_env() -> Self {
        Self::parse().apply_env(|key| std::env::var(key).ok())
    }

    /// Fill values the user left unset from `lookup`
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.verbose && !self.quiet {
            self.verbose = lookup(ENV_VERBOSE)
                .map(|value| {
                    matches!(
                        value.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes"
                    )
                })
                .unwrap_or(false);
        }

        let mut command = self.command.take().unwrap_or_default();
        if let Command::Sync { config, secrets } = &mut command {
            if config.is_none() {
                *config = lookup(ENV_CONFIG).filter(|v| !v.is_empty()).map(PathBuf::from);
            }
            if secrets.is_none() {
                *secrets = lookup(ENV_SECRETS).filter(|v| !v.is_empty()).map(PathBuf::from);
            }
        }
        self.command = Some(command);
        self
    }
}
