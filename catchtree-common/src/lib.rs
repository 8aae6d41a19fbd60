//! # Catch Tree Common Library
//!
//! Core of the catch-composition editor:
//! - Parameter schema and plain batch data types
//! - Arena tree and keyboard navigation over it
//! - Batch model compiler (schema + data → bounded-depth model tree)
//! - Declarative rule engine
//! - Configuration loading

pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod rules;
pub mod schema;
pub mod tree;
pub mod values;

pub use error::{Error, Result};
pub use model::{BatchModel, BatchModelTree};
