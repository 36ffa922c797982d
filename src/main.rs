//! Crowsnest - container lookout
//!
//! Watches a compose project's services over HTTP and restarts the
//! containers of those that stop answering.

mod cli;
mod dock;
mod error;
mod manifest;
mod roster;
mod sickbay;
mod warden;

use cli::{Cli, Commands};
use error::Result;
use manifest::Overrides;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();

    if let Commands::Completion { shell } = cli.command {
        Cli::generate_completion(shell);
        return Ok(());
    }

    init_logging(cli.verbose);

    let allow_missing = cli.uses_default_config();
    let mut config = manifest::load(&cli.config, allow_missing)?;
    config.apply_overrides(&Overrides::from(cli.overrides))?;

    match cli.command {
        Commands::Check => {
            println!("Configuration is valid");
            println!("  project:         {}", config.config.project);
            println!("  interval:        {}s", config.config.interval);
            println!("  probe timeout:   {}s", config.config.probe_timeout);
            println!("  restart timeout: {}s", config.config.restart_timeout);
            println!("  default host:    {}", config.config.default_host);
            println!("\nServices ({}):", config.services.len());
            for service in &config.services {
                println!("  {:<16} port {}", service.name, service.port);
            }
            Ok(())
        }

        Commands::Watch => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let warden = build_warden(&config).await?;
                tracing::info!("Warden supervisor started. Press Ctrl+C to stop.");
                warden
                    .run(async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            tracing::error!("failed to listen for Ctrl+C: {}", e);
                            std::future::pending::<()>().await;
                        }
                    })
                    .await;
                Ok::<(), error::Error>(())
            })
        }

        Commands::Probe { json } => {
            let rt = tokio::runtime::Runtime::new()?;
            let entries = rt.block_on(async {
                let warden = build_warden(&config).await?;
                Ok::<_, error::Error>(warden.survey().await)
            })?;

            if json {
                let rows: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "service": e.service,
                            "port": e.port,
                            "container": e.container,
                            "alive": e.liveness.as_ref().map(|l| l.is_alive()),
                            "host": e.liveness.as_ref().and_then(|l| l.host()),
                        })
                    })
                    .collect();
                let output = serde_json::to_string_pretty(&rows)?;
                println!("{}", output);
            } else {
                println!("{:<16} {:<6} {:<14} STATUS", "SERVICE", "PORT", "CONTAINER");
                for entry in &entries {
                    let container = entry
                        .container
                        .as_deref()
                        .map(|id| id.chars().take(12).collect::<String>())
                        .unwrap_or_else(|| "-".to_string());
                    let status = match &entry.liveness {
                        Some(liveness) => liveness.to_string(),
                        None => "not running".to_string(),
                    };
                    println!("{:<16} {:<6} {:<14} {}", entry.service, entry.port, container, status);
                }
            }
            Ok(())
        }

        Commands::Completion { .. } => Ok(()),
    }
}

/// Connect to the runtime and assemble the Warden from configuration
async fn build_warden(
    config: &manifest::CrowsnestConfig,
) -> Result<warden::Warden<dock::DockerRuntime, sickbay::UreqClient>> {
    let runtime = dock::DockerRuntime::connect().await?;
    let http = sickbay::UreqClient::new(config.config.probe_timeout_duration());
    let roster = roster::Roster::from_config(config);
    let settings = warden::Settings::from_config(&config.config);
    Ok(warden::Warden::new(runtime, http, roster, settings))
}
