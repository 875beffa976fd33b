//! Donation distribution calculation.
//!
//! Converts aggregated usage weights into dollar amounts under
//! threshold/cap constraints.
//!
//! # Algorithm Summary
//!
//! 1. Rank positive-weight projects (weight descending, id ascending)
//! 2. Cap at `max_projects`; excess entries are dropped outright
//! 3. Divide the budget proportionally by weight
//! 4. Drop sub-minimum projects and re-divide until stable (fixed point)
//! 5. Round to whole cents last; the largest share absorbs the residual

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analyzer::ProjectStats;

/// Fixed blend factors for the `combined` strategy.
const COMBINED_COUNT_FACTOR: f64 = 0.5;
const COMBINED_DURATION_FACTOR: f64 = 0.3;
const COMBINED_SUCCESS_FACTOR: f64 = 0.2;

/// How to weight projects for donation allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingStrategy {
    /// Raw invocation count.
    #[default]
    Count,
    /// Summed execution duration.
    Duration,
    /// Invocation count weighted by success rate.
    Success,
    /// Fixed-weight blend of normalized count, duration and success signals.
    Combined,
}

impl fmt::Display for WeightingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Count => "count",
            Self::Duration => "duration",
            Self::Success => "success",
            Self::Combined => "combined",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WeightingStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "duration" => Ok(Self::Duration),
            "success" => Ok(Self::Success),
            "combined" => Ok(Self::Combined),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// Error type for unknown weighting strategy strings.
#[derive(Debug, Clone)]
pub struct UnknownStrategy(String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown weighting strategy: {} (expected count, duration, success or combined)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStrategy {}

/// Configuration for distribution calculation.
///
/// All values are passed in explicitly; the calculator reads no ambient
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPolicy {
    /// Total donation budget in dollars.
    pub total_budget: f64,

    /// Minimum amount per funded project, in dollars. Advisory in the
    /// terminal case where no project could meet it.
    pub min_per_project: f64,

    /// Maximum number of funded projects.
    pub max_projects: usize,

    /// How usage converts into weights.
    pub strategy: WeightingStrategy,
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self {
            total_budget: 10.0,
            min_per_project: 1.0,
            max_projects: 10,
            strategy: WeightingStrategy::Count,
        }
    }
}

/// A recommended donation to a single project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub project_id: String,

    /// Final amount in whole cents.
    pub amount_cents: i64,

    /// Share of the funded weight, as a percentage.
    pub percentage: f64,

    /// The weight that produced this recommendation.
    pub weight: f64,
}

/// Why a project was left out of the funded set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    ZeroWeight,
    BeyondMaxProjects,
    BelowMinimum,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ZeroWeight => "zero weight",
            Self::BeyondMaxProjects => "beyond max projects",
            Self::BelowMinimum => "below minimum threshold",
        };
        write!(f, "{s}")
    }
}

/// Complete donation distribution result.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionResult {
    /// The configured budget in whole cents.
    pub budget_cents: i64,

    /// Funded projects, ordered by weight descending then id.
    pub recommendations: Vec<Recommendation>,

    /// Projects that received nothing, with the reason, ordered by id.
    pub excluded: Vec<(String, ExclusionReason)>,
}

impl DistributionResult {
    /// Total amount actually allocated, in cents. Never exceeds the budget.
    pub fn allocated_cents(&self) -> i64 {
        self.recommendations.iter().map(|r| r.amount_cents).sum()
    }

    /// Budget left unallocated, in cents.
    pub fn unallocated_cents(&self) -> i64 {
        self.budget_cents - self.allocated_cents()
    }
}

/// Formats a cent amount as a dollar string (`667` → `"6.67"`).
pub fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[allow(clippy::cast_possible_truncation)]
fn to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

/// Computes per-project weights for a strategy.
///
/// Signal semantics: `count` is raw invocations, `duration` is summed
/// execution time in seconds, `success` is count scaled by success rate,
/// `combined` blends all three with each signal normalized to [0, 1]
/// across the candidate set so no single scale dominates.
#[allow(clippy::cast_precision_loss)]
pub fn compute_weights(
    stats: &HashMap<String, ProjectStats>,
    strategy: WeightingStrategy,
) -> HashMap<String, f64> {
    let signals: Vec<(&String, f64, f64, f64)> = stats
        .iter()
        .map(|(id, s)| {
            let count = s.total_count() as f64;
            let duration_secs = s.total_duration_ns() as f64 / 1_000_000_000.0;
            let success = count * s.success_rate();
            (id, count, duration_secs, success)
        })
        .collect();

    match strategy {
        WeightingStrategy::Count => signals
            .into_iter()
            .map(|(id, count, _, _)| (id.clone(), count))
            .collect(),
        WeightingStrategy::Duration => signals
            .into_iter()
            .map(|(id, _, duration, _)| (id.clone(), duration))
            .collect(),
        WeightingStrategy::Success => signals
            .into_iter()
            .map(|(id, _, _, success)| (id.clone(), success))
            .collect(),
        WeightingStrategy::Combined => {
            let max_count = signals.iter().map(|s| s.1).fold(0.0_f64, f64::max);
            let max_duration = signals.iter().map(|s| s.2).fold(0.0_f64, f64::max);
            let max_success = signals.iter().map(|s| s.3).fold(0.0_f64, f64::max);

            let norm = |value: f64, max: f64| if max > 0.0 { value / max } else { 0.0 };

            signals
                .into_iter()
                .map(|(id, count, duration, success)| {
                    let blended = COMBINED_COUNT_FACTOR * norm(count, max_count)
                        + COMBINED_DURATION_FACTOR * norm(duration, max_duration)
                        + COMBINED_SUCCESS_FACTOR * norm(success, max_success);
                    (id.clone(), blended)
                })
                .collect()
        }
    }
}

/// Calculates the donation distribution for a set of usage weights.
///
/// Degenerate inputs (no weights, non-positive budget) yield an empty
/// result rather than an error. Output is deterministic: identical inputs
/// always produce identical recommendations in identical order.
pub fn allocate(weights: &HashMap<String, f64>, policy: &DistributionPolicy) -> DistributionResult {
    let budget_cents = to_cents(policy.total_budget.max(0.0));

    if weights.is_empty() || policy.total_budget <= 0.0 {
        return DistributionResult {
            budget_cents,
            recommendations: Vec::new(),
            excluded: Vec::new(),
        };
    }

    let mut excluded: Vec<(String, ExclusionReason)> = Vec::new();
    let mut ranked: Vec<(&str, f64)> = Vec::new();

    for (id, &weight) in weights {
        if weight > 0.0 {
            ranked.push((id.as_str(), weight));
        } else {
            excluded.push((id.clone(), ExclusionReason::ZeroWeight));
        }
    }

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut funded = ranked;
    if funded.len() > policy.max_projects {
        for (id, _) in funded.drain(policy.max_projects..) {
            excluded.push((id.to_string(), ExclusionReason::BeyondMaxProjects));
        }
    }

    if funded.is_empty() {
        excluded.sort_by(|a, b| a.0.cmp(&b.0));
        return DistributionResult {
            budget_cents,
            recommendations: Vec::new(),
            excluded,
        };
    }

    // Fixed-point threshold loop: drop sub-minimum projects and re-divide
    // the budget among the survivors until stable. Re-dividing is the
    // proportional redistribution of the pooled amounts. The minimum is
    // advisory: a pass that would drop every remaining project instead
    // keeps the current set.
    loop {
        let total_weight: f64 = funded.iter().map(|(_, w)| w).sum();
        let below: Vec<usize> = funded
            .iter()
            .enumerate()
            .filter(|(_, (_, w))| w / total_weight * policy.total_budget < policy.min_per_project)
            .map(|(i, _)| i)
            .collect();

        if below.is_empty() || below.len() == funded.len() {
            break;
        }
        for &i in below.iter().rev() {
            let (id, _) = funded.remove(i);
            excluded.push((id.to_string(), ExclusionReason::BelowMinimum));
        }
    }

    let total_weight: f64 = funded.iter().map(|(_, w)| w).sum();
    let mut recommendations: Vec<Recommendation> = funded
        .iter()
        .map(|&(id, weight)| {
            let share = weight / total_weight;
            Recommendation {
                project_id: id.to_string(),
                amount_cents: to_cents(share * policy.total_budget),
                percentage: share * 100.0,
                weight,
            }
        })
        .collect();

    // Rounding happens per-project above; the largest share absorbs the
    // residual so the allocated total equals the budget without exceeding it.
    let allocated: i64 = recommendations.iter().map(|r| r.amount_cents).sum();
    if let Some(largest) = recommendations.first_mut() {
        largest.amount_cents = (largest.amount_cents + budget_cents - allocated).max(0);
    }

    excluded.sort_by(|a, b| a.0.cmp(&b.0));

    DistributionResult {
        budget_cents,
        recommendations,
        excluded,
    }
}
