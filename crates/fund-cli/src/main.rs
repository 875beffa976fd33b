use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fund_cli::commands::{analyze, config_cmd, donate, projects, recommend, stats, unknowns, util};
use fund_cli::{Cli, Commands, Config};

/// Load configuration, merging an explicit config file if given.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Analyze {
            period,
            hostname,
            limit,
            no_unknown,
            aliases,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let options = analyze::Options {
                period: period.clone(),
                hostname: hostname.clone(),
                limit: *limit,
                show_unknown: !no_unknown,
                resolve_aliases: *aliases,
            };
            analyze::run(&config, &options)?;
        }
        Some(Commands::Recommend {
            amount,
            period,
            max_projects,
            min_amount,
            weight,
            format,
            hostname,
            aliases,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let options = recommend::Options {
                amount: *amount,
                period: period.clone(),
                max_projects: *max_projects,
                min_amount: *min_amount,
                weight: weight.clone(),
                format: format.clone(),
                hostname: hostname.clone(),
                resolve_aliases: *aliases,
            };
            recommend::run(&config, &options)?;
        }
        Some(Commands::Donate {
            amount,
            period,
            max_projects,
            output,
            hostname,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let options = donate::Options {
                amount: *amount,
                period: period.clone(),
                max_projects: *max_projects,
                output: output.clone(),
                hostname: hostname.clone(),
            };
            donate::run(&config, &options)?;
        }
        Some(Commands::Projects { query, all }) => {
            let config = load_config(cli.config.as_deref())?;
            let mapper = util::build_mapper(&config, false)?;
            projects::run(&mapper, query.as_deref(), *all)?;
        }
        Some(Commands::Unknowns { action }) => {
            let config = load_config(cli.config.as_deref())?;
            unknowns::run(&config, action)?;
        }
        Some(Commands::Stats) => {
            let config = load_config(cli.config.as_deref())?;
            stats::run(&config)?;
        }
        Some(Commands::Config { show: _, init, path }) => {
            config_cmd::run(*init, *path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
