//! Dynamic values held in scope property bags.
//!
//! This module provides the value model the digest engine compares:
//! - `Value`: scalars plus reference-typed arrays and objects
//! - `Comparison`: reference or deep change detection

mod equality;
#[allow(clippy::module_inception)]
mod value;

pub use equality::{equal, Comparison};
pub use value::{Array, Object, Value};
