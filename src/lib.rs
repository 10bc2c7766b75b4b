//! Common functionality for resopt, a tool for jointly sizing and dispatching renewable energy
//! supply systems.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod finance;
pub mod input;
pub mod log;
pub mod model;
pub mod optimisation;
pub mod output;
pub mod profile;
pub mod results;
pub mod settings;
pub mod simulation;
pub mod sweep;
pub mod timestep;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the path to the folder where resopt's configuration files are stored
pub fn get_resopt_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("resopt");
    path
}
