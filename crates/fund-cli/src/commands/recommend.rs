//! Recommend command: donation recommendations from usage.

use std::fmt::Write;

use anyhow::{Result, bail};
use serde::Serialize;

use fund_core::{
    DistributionPolicy, DistributionResult, ProjectMapper, UsageAnalysis, allocate,
    compute_weights, format_cents,
};
use fund_db::Period;

use crate::config::Config;

use super::util;

/// Options for the recommend command.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub amount: Option<f64>,
    pub period: Option<String>,
    pub max_projects: Option<usize>,
    pub min_amount: Option<f64>,
    pub weight: Option<String>,
    pub format: String,
    pub hostname: Option<String>,
    pub resolve_aliases: bool,
}

/// Output format for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Markdown,
    Json,
}

impl OutputFormat {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => bail!("unknown output format: {other} (expected table, markdown or json)"),
        }
    }
}

/// JSON output structure.
#[derive(Debug, Serialize)]
struct JsonReport {
    total_amount: String,
    period: String,
    weighting: String,
    recommendations: Vec<JsonRecommendation>,
}

#[derive(Debug, Serialize)]
struct JsonRecommendation {
    project: String,
    project_id: String,
    amount: String,
    percentage: f64,
    usage_count: u64,
    donation_url: Option<String>,
}

fn usage_count(analysis: &UsageAnalysis, project_id: &str) -> u64 {
    analysis
        .project_stats
        .get(project_id)
        .map_or(0, fund_core::ProjectStats::total_count)
}

/// Formats recommendations as a plain-text table.
pub fn format_table(
    result: &DistributionResult,
    analysis: &UsageAnalysis,
    mapper: &ProjectMapper,
    policy: &DistributionPolicy,
) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "DONATION RECOMMENDATIONS (${} total)",
        format_cents(result.budget_cents)
    )
    .unwrap();
    let start = util::format_date(analysis.period_start, "beginning");
    let end = util::format_date(analysis.period_end, "now");
    writeln!(output, "Period: {start} to {end}").unwrap();
    writeln!(output, "Commands analyzed: {}", analysis.total_commands).unwrap();
    writeln!(output, "Weighting: {}", policy.strategy).unwrap();
    writeln!(output).unwrap();

    writeln!(
        output,
        "{:<24} {:>8} {:>7}  DONATE AT",
        "PROJECT", "AMOUNT", "USAGE"
    )
    .unwrap();

    for rec in &result.recommendations {
        let (name, url) = mapper.get_project(&rec.project_id).map_or_else(
            || (rec.project_id.as_str(), None),
            |p| (p.name.as_str(), p.primary_donation_url()),
        );
        writeln!(
            output,
            "{:<24} {:>8} {:>6.1}%  {}",
            name,
            format!("${}", format_cents(rec.amount_cents)),
            rec.percentage,
            url.unwrap_or("(no link)"),
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "Total: ${}", format_cents(result.allocated_cents())).unwrap();

    if !analysis.unknown_executables.is_empty() {
        writeln!(output).unwrap();
        writeln!(
            output,
            "{} unknown executables not included. Run 'fund analyze' to see them.",
            analysis.unknown_executables.len()
        )
        .unwrap();
    }

    output
}

/// Formats recommendations as markdown.
pub fn format_markdown(
    result: &DistributionResult,
    analysis: &UsageAnalysis,
    mapper: &ProjectMapper,
) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "# Donation Recommendations (${})",
        format_cents(result.budget_cents)
    )
    .unwrap();
    writeln!(output).unwrap();
    let start = util::format_date(analysis.period_start, "beginning");
    let end = util::format_date(analysis.period_end, "now");
    writeln!(output, "Based on usage from {start} to {end}").unwrap();
    writeln!(output, "({} commands analyzed)", analysis.total_commands).unwrap();
    writeln!(output).unwrap();
    writeln!(output, "| Project | Amount | Usage | Donate At |").unwrap();
    writeln!(output, "|---------|--------|-------|-----------|").unwrap();

    for rec in &result.recommendations {
        let (name, url) = mapper.get_project(&rec.project_id).map_or_else(
            || (rec.project_id.as_str(), None),
            |p| (p.name.as_str(), p.primary_donation_url()),
        );
        writeln!(
            output,
            "| {} | ${} | {:.1}% | {} |",
            name,
            format_cents(rec.amount_cents),
            rec.percentage,
            url.unwrap_or("N/A"),
        )
        .unwrap();
    }

    output
}

/// Formats recommendations as JSON.
pub fn format_json(
    result: &DistributionResult,
    analysis: &UsageAnalysis,
    mapper: &ProjectMapper,
    period: Period,
    policy: &DistributionPolicy,
) -> Result<String> {
    let recommendations = result
        .recommendations
        .iter()
        .map(|rec| {
            let project = mapper.get_project(&rec.project_id);
            JsonRecommendation {
                project: project.map_or_else(|| rec.project_id.clone(), |p| p.name.clone()),
                project_id: rec.project_id.clone(),
                amount: format_cents(rec.amount_cents),
                percentage: rec.percentage,
                usage_count: usage_count(analysis, &rec.project_id),
                donation_url: project
                    .and_then(fund_core::Project::primary_donation_url)
                    .map(String::from),
            }
        })
        .collect();

    let report = JsonReport {
        total_amount: format_cents(result.budget_cents),
        period: period.to_string(),
        weighting: policy.strategy.to_string(),
        recommendations,
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

/// Runs the recommend command.
pub fn run(config: &Config, options: &Options) -> Result<()> {
    let format = OutputFormat::parse(&options.format)?;
    let period = util::resolve_period(options.period.as_deref(), config)?;
    let policy = util::build_policy(
        config,
        options.amount,
        options.min_amount,
        options.max_projects,
        options.weight.as_deref(),
    )?;

    let (mapper, analysis) =
        util::run_analysis(config, period, options.hostname.as_deref(), options.resolve_aliases)?;

    if analysis.project_stats.is_empty() {
        println!("No known projects found in command history.");
        return Ok(());
    }

    let weights = compute_weights(&analysis.project_stats, policy.strategy);
    let result = allocate(&weights, &policy);

    match format {
        OutputFormat::Json => println!("{}", format_json(&result, &analysis, &mapper, period, &policy)?),
        OutputFormat::Markdown => print!("{}", format_markdown(&result, &analysis, &mapper)),
        OutputFormat::Table => print!("{}", format_table(&result, &analysis, &mapper, &policy)),
    }

    Ok(())
}
