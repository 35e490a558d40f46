//! # vizlink-cli
//!
//! Runs a task list against a running application: loads a TOML
//! config, reads tasks as a JSON array, executes them over one
//! session and prints what came back.

pub mod config;
pub mod logging;
pub mod report;
pub mod tasks;
