use crate::error::TableError;
use crate::functions::FunctionSpec;
use crate::tables::meta::TableParams;
use crate::tables::polynomial::PolynomialPiece;
use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Template pairs the registry exposes, matching the classic coverage of
/// rational tables up to combined degree 7
pub const PADE_DEGREES: [(usize, usize); 12] = [
    (1, 1),
    (2, 1),
    (3, 1),
    (4, 1),
    (5, 1),
    (6, 1),
    (2, 2),
    (3, 2),
    (4, 2),
    (5, 2),
    (3, 3),
    (4, 3),
];

const FACTORIALS: [f64; 8] = [1.0, 1.0, 2.0, 6.0, 24.0, 120.0, 720.0, 5040.0];
const ROOT_PROBES: usize = 64;

/// Rational lookup table: each piece holds an [M/N] Pade approximant about
/// its grid point, stored as M+1 numerator coefficients followed by the N
/// non-constant denominator coefficients (the denominator's constant term
/// is normalised to one and not stored).
///
/// Pieces are centred: the hash adds one half before truncating, so piece i
/// covers the half-open band of width h around grid point i and the local
/// variable ranges over [-h/2, h/2).
#[derive(Debug, Clone)]
pub struct PadeTable {
    name: String,
    order: usize,
    min_arg: f64,
    max_arg: f64,
    step_size: f64,
    step_size_inv: f64,
    table_max: f64,
    num_intervals: usize,
    m: usize,
    n: usize,
    taylor_fallbacks: usize,
    pieces: Vec<PolynomialPiece<8>>,
}

impl PadeTable {
    pub fn num_degree(&self) -> usize {
        self.m
    }

    pub fn den_degree(&self) -> usize {
        self.n
    }

    /// Number of pieces where a denominator root forced the Taylor fallback
    pub fn taylor_fallbacks(&self) -> usize {
        self.taylor_fallbacks
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn min_arg(&self) -> f64 {
        self.min_arg
    }

    pub fn max_arg(&self) -> f64 {
        self.max_arg
    }

    pub fn table_max_arg(&self) -> f64 {
        self.table_max
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn num_intervals(&self) -> usize {
        self.num_intervals
    }

    pub fn num_table_entries(&self) -> usize {
        self.pieces.len()
    }

    pub fn ncoefs_per_entry(&self) -> usize {
        self.m + self.n + 1
    }

    pub fn data_size(&self) -> usize {
        std::mem::size_of::<PolynomialPiece<8>>() * self.pieces.len()
    }

    pub fn piece_coef(&self, i: usize, j: usize) -> f64 {
        self.pieces[i].coefs[j]
    }

    pub fn bounds_of_subinterval(&self, i: usize) -> (f64, f64) {
        // bands centred on grid points, clipped to the table range
        let centre = self.min_arg + (i as f64) * self.step_size;
        let lo = (centre - 0.5 * self.step_size).max(self.min_arg);
        let hi = (centre + 0.5 * self.step_size).min(self.table_max);
        (lo, hi)
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        let from_min = x - self.min_arg;
        let shifted = from_min * self.step_size_inv + 0.5;
        let i = (shifted as usize).min(self.num_intervals);
        let dx = from_min - (i as f64) * self.step_size;
        let c = &self.pieces[i].coefs;
        let mut p = 0.0;
        for k in (1..=self.m).rev() {
            p = (c[k] + p) * dx;
        }
        p += c[0];
        let mut q = 0.0;
        for k in (1..=self.n).rev() {
            q = (c[self.m + k] + q) * dx;
        }
        p / (1.0 + q)
    }
}

/// Denominator coefficients [1, Q1, ..., QN] from the Taylor block, via a
/// null-space computation on the Hankel rows: the matrix is padded square
/// and the singular vector of the smallest singular value is normalised so
/// its constant term is one. Returns None when the normalisation divides by
/// (numerically) zero.
fn denominator_from_taylor(taylor: &[f64], m: usize, n: usize) -> Option<Vec<f64>> {
    let mut hankel = DMatrix::zeros(n + 1, n + 1);
    for i in 1..=n {
        for j in 0..=n {
            let idx = m as isize + i as isize - j as isize;
            if idx >= 0 {
                hankel[(i - 1, j)] = taylor[idx as usize];
            }
        }
    }
    let svd = hankel.svd(false, true);
    let v_t = svd.v_t?;
    let mut null_row = 0;
    let mut smallest = f64::INFINITY;
    for (i, s) in svd.singular_values.iter().enumerate() {
        if *s < smallest {
            smallest = *s;
            null_row = i;
        }
    }
    let q0 = v_t[(null_row, 0)];
    if q0.abs() < 1e-14 {
        return None;
    }
    Some((0..=n).map(|j| v_t[(null_row, j)] / q0).collect())
}

/// Check for a denominator root inside the band a piece actually serves.
/// Corner pieces only serve half a band, so a root on the unreachable side
/// is allowed.
fn denominator_root_in_piece(q: &[f64], half: f64, first: bool, last: bool) -> bool {
    let lo = if first { 0.0 } else { -half };
    let hi = if last { 0.0 } else { half };
    if hi <= lo {
        return false;
    }
    // denominator written as 1 + dx*(Q1 + dx*(...)), matching eval
    let qval = |dx: f64| {
        let mut acc = 0.0;
        for k in (1..q.len()).rev() {
            acc = (q[k] + acc) * dx;
        }
        1.0 + acc
    };
    let mut prev = qval(lo);
    for k in 1..=ROOT_PROBES {
        let dx = lo + (hi - lo) * (k as f64) / (ROOT_PROBES as f64);
        let value = qval(dx);
        if value == 0.0 || value.signum() != prev.signum() {
            return true;
        }
        prev = value;
    }
    false
}

pub fn build_pade(
    spec: &FunctionSpec,
    params: TableParams,
    m: usize,
    n: usize,
) -> Result<PadeTable, TableError> {
    if m == 0 || n == 0 || m < n || m + n + 1 > 8 {
        return Err(TableError::BadArgument(format!(
            "Pade table degrees [{}/{}] are outside the supported set",
            m, n
        )));
    }
    if !spec.has_derivatives(m + n) {
        return Err(TableError::BadArgument(format!(
            "PadeTable<{},{}> needs the order-{} derivative variant of '{}'",
            m,
            n,
            m + n,
            spec.name()
        )));
    }

    let num_intervals = params.num_intervals();
    let table_max = params.table_max();
    let half = 0.5 * params.step_size;

    let built: Vec<(PolynomialPiece<8>, bool)> = (0..num_intervals)
        .into_par_iter()
        .map(|ii| {
            let x = params.min_arg + (ii as f64) * params.step_size;
            let derivs = spec.derivatives(x, m + n)?;
            let taylor: Vec<f64> = derivs
                .iter()
                .enumerate()
                .map(|(i, d)| d / FACTORIALS[i])
                .collect();

            let mut fallback = false;
            let q = match denominator_from_taylor(&taylor, m, n) {
                Some(q) => {
                    if denominator_root_in_piece(
                        &q,
                        half,
                        ii == 0,
                        ii + 1 == num_intervals,
                    ) {
                        fallback = true;
                        None
                    } else {
                        Some(q)
                    }
                }
                None => {
                    fallback = true;
                    None
                }
            };

            let mut coefs = [0.0; 8];
            match q {
                Some(q) => {
                    for (k, c) in coefs.iter_mut().enumerate().take(m + 1) {
                        let top = k.min(n);
                        *c = (0..=top).map(|j| taylor[k - j] * q[j]).sum();
                    }
                    for k in 0..n {
                        coefs[m + 1 + k] = q[k + 1];
                    }
                }
                None => {
                    coefs[..(m + 1)].copy_from_slice(&taylor[..(m + 1)]);
                }
            }
            Ok((PolynomialPiece::new(coefs), fallback))
        })
        .collect::<Result<Vec<_>, TableError>>()?;

    let taylor_fallbacks = built.iter().filter(|(_, f)| *f).count();
    if taylor_fallbacks > 0 {
        debug!(
            "PadeTable<{},{}>: {} of {} pieces fell back to Taylor form",
            m, n, taylor_fallbacks, num_intervals
        );
    }
    let mut pieces: Vec<PolynomialPiece<8>> = built.into_iter().map(|(p, _)| p).collect();
    pieces.push(PolynomialPiece::sentinel(spec.eval(table_max)));

    Ok(PadeTable {
        name: format!("UniformPadeTable<{},{}>", m, n),
        order: m + n + 1,
        min_arg: params.min_arg,
        max_arg: params.max_arg,
        step_size: params.step_size,
        step_size_inv: 1.0 / params.step_size,
        table_max,
        num_intervals,
        m,
        n,
        taylor_fallbacks,
        pieces,
    })
}

/// Rebuild from persisted state; used by the descriptor loader
pub(crate) fn restore_pade(
    name: String,
    order: usize,
    params: TableParams,
    m: usize,
    n: usize,
    pieces: Vec<PolynomialPiece<8>>,
) -> Result<PadeTable, TableError> {
    let num_intervals = params.num_intervals();
    if pieces.len() != num_intervals + 1 {
        return Err(TableError::Persistence(format!(
            "Pade table '{}' needs {} entries, got {}",
            name,
            num_intervals + 1,
            pieces.len()
        )));
    }
    Ok(PadeTable {
        name,
        order,
        min_arg: params.min_arg,
        max_arg: params.max_arg,
        step_size: params.step_size,
        step_size_inv: 1.0 / params.step_size,
        table_max: params.table_max(),
        num_intervals,
        m,
        n,
        taylor_fallbacks: 0,
        pieces,
    })
}
