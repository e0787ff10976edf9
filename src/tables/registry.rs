use crate::error::TableError;
use crate::functions::FunctionSpec;
use crate::tables::families::{
    build_constant_taylor, build_cubic_hermite, build_cubic_interpolation, build_cubic_taylor,
    build_linear_interpolation, build_linear_taylor, build_quadratic_interpolation,
    build_quadratic_taylor, build_solved_interpolation, SolveMode,
};
use crate::tables::meta::{AnyTable, GridKind, TableParams};
use crate::tables::pade::{build_pade, PADE_DEGREES};
use std::collections::HashMap;
use std::sync::OnceLock;

type Constructor = Box<dyn Fn(&FunctionSpec, TableParams) -> Result<AnyTable, TableError> + Send + Sync>;

/// Process-wide map from table-name strings to constructors. Built once on
/// first use, read-only afterwards. Names compose as
/// `<GridKind><FamilyRoot>Table`, e.g. `UniformCubicHermiteTable` or
/// `NonUniformPseudoLinearInterpolationTable`.
static REGISTRY: OnceLock<HashMap<String, Constructor>> = OnceLock::new();

fn registry() -> &'static HashMap<String, Constructor> {
    REGISTRY.get_or_init(build_registry)
}

type FamilyBuilder = fn(&FunctionSpec, TableParams, GridKind) -> Result<AnyTable, TableError>;

fn build_registry() -> HashMap<String, Constructor> {
    let mut map: HashMap<String, Constructor> = HashMap::new();

    let all_kinds = [
        GridKind::Uniform,
        GridKind::NonUniform,
        GridKind::NonUniformPseudo,
    ];

    // interpolation-style families exist on every grid kind
    let gridded: [(&str, FamilyBuilder); 4] = [
        ("LinearInterpolationTable", build_linear_interpolation),
        ("QuadraticInterpolationTable", build_quadratic_interpolation),
        ("CubicInterpolationTable", build_cubic_interpolation),
        ("CubicHermiteTable", build_cubic_hermite),
    ];
    for (root, builder) in gridded {
        for kind in all_kinds {
            map.insert(
                format!("{}{}", kind.prefix(), root),
                Box::new(move |spec: &FunctionSpec, params: TableParams| {
                    builder(spec, params, kind)
                }),
            );
        }
    }

    let degree_roots = [
        (4usize, "QuarticSolvedInterpolationTable"),
        (5, "QuinticSolvedInterpolationTable"),
        (6, "SexticSolvedInterpolationTable"),
        (7, "SepticSolvedInterpolationTable"),
    ];
    for (degree, root) in degree_roots {
        for kind in all_kinds {
            map.insert(
                format!("{}{}", kind.prefix(), root),
                Box::new(move |spec: &FunctionSpec, params: TableParams| {
                    build_solved_interpolation(spec, params, kind, degree, SolveMode::Lu)
                }),
            );
        }
    }

    // Taylor families sample derivative data at grid points; registered on
    // the uniform grid
    let taylor: [(&str, FamilyBuilder); 4] = [
        ("ConstantTaylorTable", build_constant_taylor),
        ("LinearTaylorTable", build_linear_taylor),
        ("QuadraticTaylorTable", build_quadratic_taylor),
        ("CubicTaylorTable", build_cubic_taylor),
    ];
    for (root, builder) in taylor {
        map.insert(
            format!("Uniform{}", root),
            Box::new(move |spec: &FunctionSpec, params: TableParams| {
                builder(spec, params, GridKind::Uniform)
            }),
        );
    }

    for (m, n) in PADE_DEGREES {
        map.insert(
            format!("UniformPadeTable<{},{}>", m, n),
            Box::new(move |spec: &FunctionSpec, params: TableParams| {
                build_pade(spec, params, m, n).map(Into::into)
            }),
        );
    }

    map
}

/// Build the named table over the given function and grid parameters
pub fn create(
    name: &str,
    spec: &FunctionSpec,
    params: TableParams,
) -> Result<AnyTable, TableError> {
    let ctor = registry().get(name).ok_or_else(|| {
        TableError::BadArgument(format!("unknown table name '{}'", name))
    })?;
    ctor(spec, params)
}

/// True if the name is registered
pub fn is_registered(name: &str) -> bool {
    registry().contains_key(name)
}

/// Sorted list of every registered table name
pub fn available_tables() -> Vec<String> {
    let mut names: Vec<String> = registry().keys().cloned().collect();
    names.sort();
    names
}
