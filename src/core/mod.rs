//! Core engine: parsing, binding, classification, execution, and results.

pub mod binder;
pub mod error;
pub mod executor;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod serializer;
pub mod state;
pub mod types;
