//! Shared helpers for CLI commands.

use anyhow::{Context, Result};
use chrono::Utc;

use fund_core::{
    AnalyzeOptions, DistributionPolicy, ProjectMapper, UsageAnalysis, analyze_usage,
};
use fund_db::{HistoryDb, HistoryEntry, HistoryFilter, Period};

use crate::aliases;
use crate::config::Config;

/// Parses a period flag, falling back to the configured default.
pub fn resolve_period(flag: Option<&str>, config: &Config) -> Result<Period> {
    flag.map_or(Ok(config.analysis.default_period), |s| {
        s.parse().map_err(anyhow::Error::from)
    })
}

/// Builds the project mapper: bundled table, config overrides and optional
/// shell alias resolution, in that order.
pub fn build_mapper(config: &Config, resolve_aliases: bool) -> Result<ProjectMapper> {
    let mut mapper = ProjectMapper::bundled().context("failed to load bundled project table")?;

    for (exe, project_id) in &config.custom_mappings {
        mapper.add_custom_mapping(exe, project_id);
    }

    if resolve_aliases {
        let shell = aliases::detect_shell();
        let found = aliases::get_aliases(shell);
        let mappings = aliases::build_alias_mappings(&found, &mapper);
        tracing::debug!(count = mappings.len(), "resolved alias mappings");
        for (alias, project_id) in &mappings {
            mapper.add_custom_mapping(alias, project_id);
        }
    }

    Ok(mapper)
}

/// Loads history entries for a period, applying configured hostname excludes.
pub fn load_history(
    config: &Config,
    period: Period,
    hostname: Option<&str>,
) -> Result<Vec<HistoryEntry>> {
    let db = HistoryDb::open(&config.database.path).with_context(|| {
        format!(
            "failed to open history database at {} (is Atuin installed?)",
            config.database.path.display()
        )
    })?;

    let filter = HistoryFilter {
        period,
        hostname: hostname.map(String::from),
        include_failed: true,
    };
    let mut entries = db.query_history(&filter, Utc::now())?;

    if !config.analysis.exclude_hostnames.is_empty() {
        entries.retain(|entry| {
            !config
                .analysis
                .exclude_hostnames
                .iter()
                .any(|excluded| entry.hostname.contains(excluded))
        });
    }

    Ok(entries)
}

/// Runs the full analysis pipeline: mapper, history query, aggregation.
pub fn run_analysis(
    config: &Config,
    period: Period,
    hostname: Option<&str>,
    resolve_aliases: bool,
) -> Result<(ProjectMapper, UsageAnalysis)> {
    let mapper = build_mapper(config, resolve_aliases)?;
    let entries = load_history(config, period, hostname)?;
    let opts = AnalyzeOptions {
        include_builtins: config.analysis.include_builtins,
        exclude_executables: config.analysis.exclude_executables.clone(),
    };
    let analysis = analyze_usage(&entries, &mapper, &opts);
    Ok((mapper, analysis))
}

/// Builds the distribution policy from config plus flag overrides.
pub fn build_policy(
    config: &Config,
    amount: Option<f64>,
    min_amount: Option<f64>,
    max_projects: Option<usize>,
    weight: Option<&str>,
) -> Result<DistributionPolicy> {
    let strategy = weight.map_or(Ok(config.donation.weighting), |s| {
        s.parse().map_err(anyhow::Error::from)
    })?;

    Ok(DistributionPolicy {
        total_budget: amount.unwrap_or(config.donation.default_amount),
        min_per_project: min_amount.unwrap_or(config.donation.min_per_project),
        max_projects: max_projects.unwrap_or(config.donation.max_projects),
        strategy,
    })
}

/// Formats an optional timestamp as a date, with a fallback word.
pub fn format_date(ts: Option<chrono::DateTime<Utc>>, fallback: &str) -> String {
    ts.map_or_else(|| fallback.to_string(), |t| t.format("%Y-%m-%d").to_string())
}
