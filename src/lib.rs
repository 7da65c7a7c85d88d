//! refscript: bind numeric datasets onto computational models and script
//! against the results.
//!
//! Parse a period-labelled dataset, bind it onto a registered model by field
//! name, compute, then run scripts whose variables persist across the session.

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod journal;
pub mod models;
