//! Stats command: history database statistics.

use std::fmt::Write;

use anyhow::{Context, Result};

use fund_db::{HistoryDb, HistoryStats};

use crate::config::Config;

/// Formats the statistics summary.
pub fn format_stats(stats: &HistoryStats, path: &std::path::Path) -> String {
    let mut output = String::new();

    let format_ts = |ts: Option<chrono::DateTime<chrono::Utc>>| {
        ts.map_or_else(
            || "N/A".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
    };

    writeln!(output, "HISTORY DATABASE STATISTICS").unwrap();
    writeln!(output, "Path:           {}", path.display()).unwrap();
    writeln!(output, "Total commands: {}", stats.total_commands).unwrap();
    writeln!(output, "Oldest:         {}", format_ts(stats.oldest)).unwrap();
    writeln!(output, "Newest:         {}", format_ts(stats.newest)).unwrap();

    output
}

/// Runs the stats command.
pub fn run(config: &Config) -> Result<()> {
    let db = HistoryDb::open(&config.database.path).with_context(|| {
        format!(
            "failed to open history database at {}",
            config.database.path.display()
        )
    })?;
    let stats = db.stats()?;

    print!("{}", format_stats(&stats, &config.database.path));
    Ok(())
}
