//! Core domain logic for the donation recommender.
//!
//! This crate contains the fundamental types and logic for:
//! - Parsing: extracting canonical executable identities from shell commands
//! - Analysis: aggregating history records into per-project usage statistics
//! - Calculation: turning usage weights into a budget-constrained allocation
//! - Mapping: the executable → open-source-project lookup table

mod calculator;
pub mod analyzer;
pub mod mapper;
pub mod parser;

pub use analyzer::{
    AnalyzeOptions, ExecutableStats, ProjectStats, UsageAnalysis, UsageRecord, analyze_usage,
};
pub use calculator::{
    DistributionPolicy, DistributionResult, ExclusionReason, Recommendation, UnknownStrategy,
    WeightingStrategy, allocate, compute_weights, format_cents,
};
pub use mapper::{DonationUrl, MapperError, Project, ProjectMapper};
