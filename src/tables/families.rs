use crate::error::TableError;
use crate::functions::FunctionSpec;
use crate::tables::meta::{AnyTable, GridKind, Table, TableParams};
use crate::tables::polynomial::{rescale_to_absolute, PolynomialPiece};
use crate::tables::transfer::TransferFunction;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// How the per-piece Vandermonde systems of the solved families are
/// factored. `Lu` is the fast default; `Refined` pays full pivoting for
/// ill-conditioned functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMode {
    Lu,
    Refined,
}

/// Grid geometry shared by every family constructor: interval count, the
/// (possibly warped) left endpoints, and the transfer function that will be
/// moved into the finished table.
struct GridBuilder {
    num_intervals: usize,
    table_max: f64,
    transfer: Option<TransferFunction>,
    grid: Vec<f64>,
}

impl GridBuilder {
    fn new(spec: &FunctionSpec, params: TableParams, kind: GridKind) -> Result<Self, TableError> {
        let num_intervals = params.num_intervals();
        let table_max = params.table_max();
        let transfer = match kind {
            GridKind::Uniform => None,
            _ => Some(TransferFunction::new(
                spec,
                params.min_arg,
                table_max,
                params.step_size,
            )?),
        };
        let mut grid = Vec::with_capacity(num_intervals + 1);
        for k in 0..=num_intervals {
            let u = params.min_arg + params.step_size * (k as f64);
            grid.push(match &transfer {
                None => u,
                Some(tf) => tf.g(u),
            });
        }
        // the warp identities only hold to the fitting tolerance; pin them
        grid[0] = params.min_arg;
        grid[num_intervals] = table_max;
        for k in 0..num_intervals {
            if grid[k + 1] <= grid[k] {
                return Err(TableError::Conditioning(format!(
                    "warped grid is not increasing between intervals {} and {}",
                    k,
                    k + 1
                )));
            }
        }
        Ok(GridBuilder {
            num_intervals,
            table_max,
            transfer,
            grid,
        })
    }

    fn node(&self, i: usize) -> (f64, f64) {
        (self.grid[i], self.grid[i + 1] - self.grid[i])
    }
}

/// Fill every piece of a table from a per-piece coefficient rule working in
/// the local coordinate t = (x - left)/width. Pieces are independent, so
/// the loop runs in parallel; each task writes only its own slot.
fn build_table<const N: usize, F>(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
    root: &str,
    order: usize,
    fill: F,
) -> Result<Table<N>, TableError>
where
    F: Fn(f64, f64) -> Result<[f64; N], TableError> + Sync,
{
    let gb = GridBuilder::new(spec, params, kind)?;
    let mut pieces = (0..gb.num_intervals)
        .into_par_iter()
        .map(|i| {
            let (left, width) = gb.node(i);
            let local = fill(left, width)?;
            Ok(match kind {
                // plain nonuniform pieces evaluate on the raw argument
                GridKind::NonUniform => {
                    PolynomialPiece::new(rescale_to_absolute(&local, left, width))
                }
                _ => PolynomialPiece::new(local),
            })
        })
        .collect::<Result<Vec<PolynomialPiece<N>>, TableError>>()?;
    pieces.push(PolynomialPiece::sentinel(spec.eval(gb.table_max)));
    Table::assemble(
        format!("{}{}", kind.prefix(), root),
        order,
        params,
        kind,
        gb.transfer,
        pieces,
    )
}

fn require_derivatives(spec: &FunctionSpec, order: usize, family: &str) -> Result<(), TableError> {
    if !spec.has_derivatives(order) {
        return Err(TableError::BadArgument(format!(
            "{} needs the order-{} derivative variant of '{}'",
            family,
            order,
            spec.name()
        )));
    }
    Ok(())
}

pub fn build_constant_taylor(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    build_table::<1, _>(spec, params, kind, "ConstantTaylorTable", 1, |left, _w| {
        Ok([spec.eval(left)])
    })
    .map(Into::into)
}

pub fn build_linear_taylor(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    require_derivatives(spec, 1, "LinearTaylorTable")?;
    build_table::<2, _>(spec, params, kind, "LinearTaylorTable", 2, |left, w| {
        let d = spec.derivatives(left, 1)?;
        Ok([d[0], w * d[1]])
    })
    .map(Into::into)
}

pub fn build_quadratic_taylor(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    require_derivatives(spec, 2, "QuadraticTaylorTable")?;
    build_table::<3, _>(spec, params, kind, "QuadraticTaylorTable", 3, |left, w| {
        let d = spec.derivatives(left, 2)?;
        Ok([d[0], w * d[1], w * w * d[2] / 2.0])
    })
    .map(Into::into)
}

pub fn build_cubic_taylor(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    require_derivatives(spec, 3, "CubicTaylorTable")?;
    build_table::<4, _>(spec, params, kind, "CubicTaylorTable", 4, |left, w| {
        let d = spec.derivatives(left, 3)?;
        Ok([
            d[0],
            w * d[1],
            w * w * d[2] / 2.0,
            w * w * w * d[3] / 6.0,
        ])
    })
    .map(Into::into)
}

pub fn build_linear_interpolation(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    build_table::<2, _>(
        spec,
        params,
        kind,
        "LinearInterpolationTable",
        2,
        |left, w| {
            let y0 = spec.eval(left);
            let y1 = spec.eval(left + w);
            Ok([y0, y1 - y0])
        },
    )
    .map(Into::into)
}

pub fn build_quadratic_interpolation(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    build_table::<3, _>(
        spec,
        params,
        kind,
        "QuadraticInterpolationTable",
        3,
        |left, w| {
            let y0 = spec.eval(left);
            let y1 = spec.eval(left + 0.5 * w);
            let y2 = spec.eval(left + w);
            Ok([y0, -3.0 * y0 + 4.0 * y1 - y2, 2.0 * y0 - 4.0 * y1 + 2.0 * y2])
        },
    )
    .map(Into::into)
}

pub fn build_cubic_interpolation(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    build_table::<4, _>(
        spec,
        params,
        kind,
        "CubicInterpolationTable",
        4,
        |left, w| {
            let y0 = spec.eval(left);
            let y1 = spec.eval(left + w / 3.0);
            let y2 = spec.eval(left + 2.0 * w / 3.0);
            let y3 = spec.eval(left + w);
            Ok([
                y0,
                -5.5 * y0 + 9.0 * y1 - 4.5 * y2 + y3,
                9.0 * y0 - 22.5 * y1 + 18.0 * y2 - 4.5 * y3,
                -4.5 * y0 + 13.5 * y1 - 13.5 * y2 + 4.5 * y3,
            ])
        },
    )
    .map(Into::into)
}

pub fn build_cubic_hermite(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError> {
    require_derivatives(spec, 1, "CubicHermiteTable")?;
    build_table::<4, _>(spec, params, kind, "CubicHermiteTable", 4, |left, w| {
        let j0 = spec.derivatives(left, 1)?;
        let j1 = spec.derivatives(left + w, 1)?;
        let (y0, d0) = (j0[0], w * j0[1]);
        let (y1, d1) = (j1[0], w * j1[1]);
        Ok([
            y0,
            d0,
            -3.0 * y0 - 2.0 * d0 + 3.0 * y1 - d1,
            2.0 * y0 + d0 - 2.0 * y1 + d1,
        ])
    })
    .map(Into::into)
}

fn build_solved<const N: usize>(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
    root: &str,
    mode: SolveMode,
) -> Result<Table<N>, TableError> {
    let degree = N - 1;
    let vandermonde = DMatrix::from_fn(N, N, |i, j| {
        ((i as f64) / (degree as f64)).powi(j as i32)
    });
    let solve: Box<dyn Fn(&DVector<f64>) -> Option<DVector<f64>> + Sync> = match mode {
        SolveMode::Lu => {
            let lu = vandermonde.lu();
            Box::new(move |y| lu.solve(y))
        }
        SolveMode::Refined => {
            let lu = vandermonde.full_piv_lu();
            Box::new(move |y| lu.solve(y))
        }
    };
    build_table::<N, _>(spec, params, kind, root, N, |left, w| {
        let y = DVector::from_fn(N, |k, _| {
            spec.eval(left + w * (k as f64) / (degree as f64))
        });
        let sol = solve(&y).ok_or_else(|| {
            TableError::Conditioning(format!(
                "Vandermonde solve failed for {} at piece starting {}",
                root, left
            ))
        })?;
        let mut coefs = [0.0; N];
        for (c, s) in coefs.iter_mut().zip(sol.iter()) {
            *c = *s;
        }
        Ok(coefs)
    })
}

pub fn build_solved_interpolation(
    spec: &FunctionSpec,
    params: TableParams,
    kind: GridKind,
    degree: usize,
    mode: SolveMode,
) -> Result<AnyTable, TableError> {
    match degree {
        4 => build_solved::<5>(spec, params, kind, "QuarticSolvedInterpolationTable", mode)
            .map(Into::into),
        5 => build_solved::<6>(spec, params, kind, "QuinticSolvedInterpolationTable", mode)
            .map(Into::into),
        6 => build_solved::<7>(spec, params, kind, "SexticSolvedInterpolationTable", mode)
            .map(Into::into),
        7 => build_solved::<8>(spec, params, kind, "SepticSolvedInterpolationTable", mode)
            .map(Into::into),
        _ => Err(TableError::BadArgument(format!(
            "solved interpolation is available for degrees 4 to 7, got {}",
            degree
        ))),
    }
}
