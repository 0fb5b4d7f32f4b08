//! Focus Protocol: staged self-assessment, profile classification, program
//! synthesis and variable-ratio reward scheduling.

pub mod assessment;
pub mod config;
pub mod error;
pub mod profile;
pub mod program;
pub mod rewards;
pub mod store;
