//! Analyze command: usage patterns for a period.

use std::fmt::Write;

use anyhow::Result;

use fund_core::{ProjectMapper, UsageAnalysis, analyzer};

use crate::config::Config;

use super::util;

/// Options for the analyze command.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub period: Option<String>,
    pub hostname: Option<String>,
    pub limit: usize,
    pub show_unknown: bool,
    pub resolve_aliases: bool,
}

/// Formats the analysis report.
#[allow(clippy::cast_precision_loss)]
pub fn format_analysis(
    analysis: &UsageAnalysis,
    mapper: &ProjectMapper,
    limit: usize,
    show_unknown: bool,
) -> String {
    let mut output = String::new();

    let start = util::format_date(analysis.period_start, "beginning");
    let end = util::format_date(analysis.period_end, "now");
    writeln!(output, "USAGE ANALYSIS: {start} to {end}").unwrap();
    writeln!(output, "Commands analyzed:  {}", analysis.total_commands).unwrap();
    writeln!(output, "Unique executables: {}", analysis.total_executables()).unwrap();

    if analysis.total_commands == 0 {
        writeln!(output).unwrap();
        writeln!(output, "No commands found for this period.").unwrap();
        return output;
    }

    writeln!(output).unwrap();
    writeln!(output, "TOP EXECUTABLES").unwrap();
    writeln!(output, "───────────────").unwrap();

    for (rank, stats) in analyzer::top_executables(analysis, limit).iter().enumerate() {
        let pct = if analysis.total_commands > 0 {
            stats.count as f64 / analysis.total_commands as f64 * 100.0
        } else {
            0.0
        };
        let project_name = mapper
            .project_for_executable(&stats.name)
            .map_or("(unknown)", |p| p.name.as_str());
        writeln!(
            output,
            "{:>3}  {:<22} {:>7} {:>6.1}%  {}",
            rank + 1,
            stats.name,
            stats.count,
            pct,
            project_name,
        )
        .unwrap();
    }

    if show_unknown && !analysis.unknown_executables.is_empty() {
        writeln!(output).unwrap();
        writeln!(
            output,
            "UNKNOWN EXECUTABLES ({} total)",
            analysis.unknown_executables.len()
        )
        .unwrap();
        writeln!(output, "───────────────────").unwrap();

        let mut unknown: Vec<(&String, &u64)> = analysis.unknown_executables.iter().collect();
        unknown.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (exe, count) in unknown.iter().take(10) {
            writeln!(output, "     {exe:<22} {count:>7}").unwrap();
        }
        writeln!(output).unwrap();
        writeln!(
            output,
            "Tip: Run 'fund unknowns investigate <exe>' to classify these."
        )
        .unwrap();
    }

    output
}

/// Runs the analyze command.
pub fn run(config: &Config, options: &Options) -> Result<()> {
    let period = util::resolve_period(options.period.as_deref(), config)?;
    let (mapper, analysis) =
        util::run_analysis(config, period, options.hostname.as_deref(), options.resolve_aliases)?;

    print!(
        "{}",
        format_analysis(&analysis, &mapper, options.limit, options.show_unknown)
    );
    Ok(())
}
