//! # Tend CLI
//!
//! Command surface over the engine crates: single and batch promotion,
//! orphan scan and repair, and the watch loop.

#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod context;
