//! Usage aggregation.
//!
//! Rolls raw history records up into per-executable and per-project
//! statistics. The record source is abstracted behind [`UsageRecord`] so the
//! aggregation works over database rows and test fixtures alike.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::mapper::ProjectMapper;
use crate::parser;

/// A history record suitable for usage analysis.
pub trait UsageRecord {
    /// Returns the raw command line.
    fn command(&self) -> &str;

    /// Returns the command's execution duration in nanoseconds.
    fn duration_ns(&self) -> i64;

    /// Returns whether the command exited successfully.
    fn success(&self) -> bool;

    /// Returns when the command was run.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Options controlling the aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Count shell builtins (cd, echo, ...) as usage.
    pub include_builtins: bool,

    /// Executables to drop from the analysis entirely.
    pub exclude_executables: Vec<String>,
}

/// Statistics for a single executable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutableStats {
    pub name: String,
    pub count: u64,
    pub total_duration_ns: i64,
    pub success_count: u64,
    pub fail_count: u64,
    pub first_used: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

impl ExecutableStats {
    /// Success rate in [0.0, 1.0]. Zero when nothing was recorded.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.fail_count;
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64
    }

    /// Average duration in milliseconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_duration_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.total_duration_ns as f64 / self.count as f64) / 1_000_000.0
    }
}

/// Aggregated statistics for a project, which may own several executables.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectStats {
    pub project_id: String,
    pub executables: HashMap<String, ExecutableStats>,
}

impl ProjectStats {
    fn new(project_id: String) -> Self {
        Self {
            project_id,
            executables: HashMap::new(),
        }
    }

    /// Total invocation count across all executables.
    pub fn total_count(&self) -> u64 {
        self.executables.values().map(|s| s.count).sum()
    }

    /// Total duration across all executables, in nanoseconds.
    pub fn total_duration_ns(&self) -> i64 {
        self.executables.values().map(|s| s.total_duration_ns).sum()
    }

    /// Total successful invocations.
    pub fn total_success(&self) -> u64 {
        self.executables.values().map(|s| s.success_count).sum()
    }

    /// Total failed invocations.
    pub fn total_fail(&self) -> u64 {
        self.executables.values().map(|s| s.fail_count).sum()
    }

    /// Overall success rate in [0.0, 1.0].
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_success() + self.total_fail();
        if total == 0 {
            return 0.0;
        }
        self.total_success() as f64 / total as f64
    }
}

/// Complete usage analysis results.
#[derive(Debug, Clone)]
pub struct UsageAnalysis {
    /// Timestamp of the earliest analyzed record, if any.
    pub period_start: Option<DateTime<Utc>>,

    /// Timestamp of the latest analyzed record, if any.
    pub period_end: Option<DateTime<Utc>>,

    /// Number of history records processed.
    pub total_commands: u64,

    /// Per-executable statistics, keyed by canonical name.
    pub executable_stats: HashMap<String, ExecutableStats>,

    /// Per-project rollups, keyed by project id.
    pub project_stats: HashMap<String, ProjectStats>,

    /// Executables with no known project mapping, with usage counts.
    pub unknown_executables: HashMap<String, u64>,
}

impl UsageAnalysis {
    /// Number of distinct executables observed.
    pub fn total_executables(&self) -> usize {
        self.executable_stats.len()
    }

    /// Usage events attributed to a known project.
    pub fn known_count(&self) -> u64 {
        self.project_stats.values().map(ProjectStats::total_count).sum()
    }

    /// Usage events with no project mapping.
    pub fn unknown_count(&self) -> u64 {
        self.unknown_executables.values().sum()
    }
}

/// Aggregates history records into usage statistics.
///
/// Each executable extracted from a record counts as one usage event
/// carrying the record's duration and success flag. Executables are then
/// grouped by project through `mapper`; unmapped ones are bucketed into
/// `unknown_executables`.
pub fn analyze_usage<R: UsageRecord>(
    records: &[R],
    mapper: &ProjectMapper,
    opts: &AnalyzeOptions,
) -> UsageAnalysis {
    let mut exe_stats: HashMap<String, ExecutableStats> = HashMap::new();
    let mut total_commands = 0u64;
    let mut period_start: Option<DateTime<Utc>> = None;
    let mut period_end: Option<DateTime<Utc>> = None;

    for record in records {
        total_commands += 1;
        let ts = record.timestamp();

        if period_start.is_none_or(|start| ts < start) {
            period_start = Some(ts);
        }
        if period_end.is_none_or(|end| ts > end) {
            period_end = Some(ts);
        }

        for exe in parser::extract_executables(record.command(), opts.include_builtins) {
            if opts.exclude_executables.iter().any(|e| e == &exe) {
                continue;
            }

            let stats = exe_stats.entry(exe.clone()).or_default();
            if stats.name.is_empty() {
                stats.name = exe;
            }

            stats.count += 1;
            stats.total_duration_ns += record.duration_ns();
            if record.success() {
                stats.success_count += 1;
            } else {
                stats.fail_count += 1;
            }

            if stats.first_used.is_none_or(|first| ts < first) {
                stats.first_used = Some(ts);
            }
            if stats.last_used.is_none_or(|last| ts > last) {
                stats.last_used = Some(ts);
            }
        }
    }

    // Group by project
    let mut project_stats: HashMap<String, ProjectStats> = HashMap::new();
    let mut unknown: HashMap<String, u64> = HashMap::new();

    for (exe, stats) in &exe_stats {
        if let Some(project_id) = mapper.map_executable(exe) {
            project_stats
                .entry(project_id.to_string())
                .or_insert_with(|| ProjectStats::new(project_id.to_string()))
                .executables
                .insert(exe.clone(), stats.clone());
        } else {
            unknown.insert(exe.clone(), stats.count);
        }
    }

    tracing::debug!(
        total_commands,
        executables = exe_stats.len(),
        projects = project_stats.len(),
        unknown = unknown.len(),
        "usage analysis complete"
    );

    UsageAnalysis {
        period_start,
        period_end,
        total_commands,
        executable_stats: exe_stats,
        project_stats,
        unknown_executables: unknown,
    }
}

/// Top executables by count, ties broken by name for stable output.
pub fn top_executables(analysis: &UsageAnalysis, limit: usize) -> Vec<&ExecutableStats> {
    let mut sorted: Vec<&ExecutableStats> = analysis.executable_stats.values().collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    sorted.truncate(limit);
    sorted
}

/// Top projects by total count, ties broken by id for stable output.
pub fn top_projects(analysis: &UsageAnalysis, limit: usize) -> Vec<&ProjectStats> {
    let mut sorted: Vec<&ProjectStats> = analysis.project_stats.values().collect();
    sorted.sort_by(|a, b| {
        b.total_count()
            .cmp(&a.total_count())
            .then_with(|| a.project_id.cmp(&b.project_id))
    });
    sorted.truncate(limit);
    sorted
}
