//! Numeric data types, numeric literals, and emitted-variable declarations.
//!
//! This crate is the leaf of the workspace: everything above it (the graph IR,
//! the passes, the emitters) describes signals in terms of [`DataType`] and
//! carries constants / initial conditions as [`NumericValue`] sequences.
//! State that survives into the generated program is declared through
//! [`Variable`], which owns the C declaration formatting.

mod data_type;
mod numeric;
mod variable;

pub use data_type::{DataType, TypeParseError};
pub use numeric::{NumericParseError, NumericValue};
pub use variable::Variable;
