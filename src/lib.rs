//! Meander migration analysis library
//!
//! Re-exports modules for use by the binary and tests.

pub mod cli;
pub mod config;
pub mod covariates;
pub mod data;
pub mod erodibility;
pub mod error;
pub mod io;
pub mod lme;
pub mod model;
pub mod phase_lag;
pub mod planform;
pub mod stats;
pub mod synth;
