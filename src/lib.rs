// MIT License
//! Precomputed piecewise-polynomial lookup tables for expensive scalar
//! functions.
//!
//! Given a function, an argument range and either a step size, an accuracy
//! target or a memory budget, the crate builds a table that maps an
//! argument to its polynomial piece in constant time and evaluates that
//! piece with one Horner pass. Interpolation, Taylor, Hermite and Pade
//! families are available over uniform grids; a monotone transfer function
//! warps the grid for functions with localized steep behaviour while the
//! hash stays O(1). Tables serialize to JSON descriptors and rebuild from
//! them without touching the original function.
//!
//! ```
//! use polylut::functions::FunctionSpec;
//! use polylut::tables::meta::TableParams;
//! use polylut::tables::make_table;
//!
//! let spec = FunctionSpec::new("sin", |x: f64| x.sin());
//! let params = TableParams::new(0.0, 1.0, 0.0625).unwrap();
//! let table = make_table("UniformCubicInterpolationTable", &spec, params).unwrap();
//! assert!((table.eval(0.7) - 0.7f64.sin()).abs() < 1e-7);
//! ```
pub mod error;
pub mod functions;
pub mod numerical;
pub mod tables;
pub mod utils;

pub use crate::error::TableError;
