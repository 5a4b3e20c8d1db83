//! Testing utilities for openai-responses.
//!
//! - [`fixtures`]: pre-built resources and request helpers

pub mod fixtures;

pub use fixtures::*;
