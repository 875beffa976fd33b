//! Donation recommender CLI library.
//!
//! This crate provides the `fund` command-line interface.

pub mod aliases;
mod cli;
pub mod commands;
mod config;
pub mod links;

pub use cli::{Cli, Commands, UnknownsAction};
pub use config::Config;
