/// Piecewise-polynomial lookup tables: data layout, grid hashing, family
/// construction, the step-size solvers, composite dispatch and
/// persistence.
///
/// The quickest route is the free functions below:
///
/// ```
/// use polylut::functions::FunctionSpec;
/// use polylut::tables::meta::TableParams;
/// use polylut::tables::make_table;
///
/// let spec = FunctionSpec::new("sin", |x: f64| x.sin());
/// let params = TableParams::new(0.0, 1.0, 0.125).unwrap();
/// let table = make_table("UniformCubicInterpolationTable", &spec, params).unwrap();
/// assert!((table.eval(0.5) - 0.5f64.sin()).abs() < 1e-6);
/// ```
pub mod composite;
pub mod descriptor;
pub mod families;
pub mod generator;
pub mod meta;
pub mod pade;
pub mod polynomial;
pub mod registry;
pub mod scenario_tests;
pub mod transfer;

use crate::error::TableError;
use crate::functions::FunctionSpec;
use descriptor::TableDescriptor;
use generator::TableGenerator;
use meta::{AnyTable, TableParams};

/// Build a table by registered name over explicit grid parameters
pub fn make_table(
    name: &str,
    spec: &FunctionSpec,
    params: TableParams,
) -> Result<AnyTable, TableError> {
    registry::create(name, spec, params)
}

/// Build a table whose worst-case relative error stays within `tolerance`
pub fn make_table_by_tolerance(
    name: &str,
    spec: &FunctionSpec,
    min_arg: f64,
    max_arg: f64,
    tolerance: f64,
) -> Result<AnyTable, TableError> {
    TableGenerator::new(spec, min_arg, max_arg)?.generate_by_tol(name, tolerance)
}

/// Build a table costing roughly `bytes` of coefficient storage
pub fn make_table_by_size(
    name: &str,
    spec: &FunctionSpec,
    min_arg: f64,
    max_arg: f64,
    bytes: usize,
) -> Result<AnyTable, TableError> {
    TableGenerator::new(spec, min_arg, max_arg)?.generate_by_size(name, bytes)
}

/// Rebuild a table from persisted state without re-evaluating the function
pub fn make_table_from_descriptor(desc: &TableDescriptor) -> Result<AnyTable, TableError> {
    descriptor::table_from_descriptor(desc)
}
