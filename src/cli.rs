//! Command-line interface for Crowsnest
//!
//! Uses clap with derive for type-safe CLI parsing

use crate::manifest::{Overrides, parse_port_override};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Default configuration file, optional when absent
pub const DEFAULT_CONFIG: &str = "crowsnest.toml";

/// Crowsnest - keeps an eye on compose services and restarts the dead ones
#[derive(Parser)]
#[command(name = "crowsnest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that take precedence over the configuration file
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Compose project whose containers are watched
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Seconds between cycles
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Seconds allowed for each HTTP probe
    #[arg(long, global = true)]
    pub probe_timeout: Option<u64>,

    /// Seconds a container gets to stop during restart
    #[arg(long, global = true)]
    pub restart_timeout: Option<u64>,

    /// Override a service port (e.g., sonarr=8989)
    #[arg(long = "port", value_name = "NAME=PORT", value_parser = parse_port_override, global = true)]
    pub ports: Vec<(String, u16)>,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Overrides {
            project: args.project,
            interval: args.interval,
            probe_timeout: args.probe_timeout,
            restart_timeout: args.restart_timeout,
            ports: args.ports,
        }
    }
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Watch services and restart dead containers until interrupted
    Watch,

    /// Locate and probe every service once, without restarting anything
    Probe {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration
    Check,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the config path is the untouched default
    pub fn uses_default_config(&self) -> bool {
        self.config.as_os_str() == DEFAULT_CONFIG
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "crowsnest", &mut std::io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_overrides() {
        let cli = Cli::try_parse_from([
            "crowsnest",
            "watch",
            "--project",
            "arr",
            "--restart-timeout",
            "10",
            "--port",
            "sonarr=18989",
            "--port",
            "radarr=17878",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Watch));
        assert!(cli.uses_default_config());
        assert_eq!(cli.overrides.project.as_deref(), Some("arr"));
        assert_eq!(cli.overrides.restart_timeout, Some(10));
        assert_eq!(
            cli.overrides.ports,
            vec![("sonarr".to_string(), 18989), ("radarr".to_string(), 17878)]
        );
    }

    #[test]
    fn test_parse_probe_json() {
        let cli = Cli::try_parse_from(["crowsnest", "-c", "/etc/crowsnest.toml", "probe", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Probe { json: true }));
        assert!(!cli.uses_default_config());
    }

    #[test]
    fn test_bad_port_override_rejected() {
        assert!(Cli::try_parse_from(["crowsnest", "watch", "--port", "sonarr"]).is_err());
    }
}
