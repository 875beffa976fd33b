//! Donate command: donation links and report files.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};

use fund_core::{allocate, compute_weights, format_cents};

use crate::config::Config;
use crate::links;

use super::util;

/// Options for the donate command.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub amount: Option<f64>,
    pub period: Option<String>,
    pub max_projects: Option<usize>,
    pub output: Option<std::path::PathBuf>,
    pub hostname: Option<String>,
}

/// Formats the donation links table.
pub fn format_links(links: &[links::DonationLink], budget_cents: i64) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "DONATION LINKS (${} total)",
        format_cents(budget_cents)
    )
    .unwrap();
    writeln!(output, "Open the links to donate. ✓ = amount pre-filled").unwrap();
    writeln!(output).unwrap();

    for link in links {
        let prefill = if link.prefilled { " ✓" } else { "" };
        writeln!(
            output,
            "{:<28} {:>8}  {}{}",
            link.project_names,
            format!("${}", format_cents(link.amount_cents)),
            link.url,
            prefill,
        )
        .unwrap();
    }

    output
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    println!("Report saved to {}", path.display());
    Ok(())
}

/// Runs the donate command.
pub fn run(config: &Config, options: &Options) -> Result<()> {
    let period = util::resolve_period(options.period.as_deref(), config)?;
    let policy = util::build_policy(config, options.amount, None, options.max_projects, None)?;

    let (mapper, analysis) = util::run_analysis(config, period, options.hostname.as_deref(), false)?;

    if analysis.project_stats.is_empty() {
        println!("No known projects found in command history.");
        return Ok(());
    }

    let weights = compute_weights(&analysis.project_stats, policy.strategy);
    let result = allocate(&weights, &policy);
    let donation_links = links::generate_links(&result, &mapper);

    if donation_links.is_empty() {
        println!("No donation links available for recommended projects.");
        return Ok(());
    }

    if let Some(output_path) = &options.output {
        let content = if output_path.extension().is_some_and(|ext| ext == "html") {
            links::html_report(&result, &mapper)
        } else {
            links::markdown_report(&result, &mapper)
        };
        write_report(output_path, &content)?;
    }

    print!("{}", format_links(&donation_links, result.budget_cents));
    Ok(())
}
