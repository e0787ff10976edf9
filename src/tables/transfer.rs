use crate::error::TableError;
use crate::functions::FunctionSpec;
use crate::numerical::quadrature;
use crate::tables::polynomial::{derivative_coefs, horner};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};

/// Number of coefficients in the polynomial approximation of g^{-1}
pub const NUM_COEFS: usize = 4;

const ENDPOINT_TOL: f64 = 1e-4;
const MONOTONE_PROBES: usize = 50;
const MAX_NEWTON_IT: usize = 20;
const MAX_BISECTION_IT: usize = 54;
const NEWTON_TOL: f64 = 1e-4;

/// Monotone warp of the table domain used to build nonuniform grids.
///
/// g maps [a, b'] onto itself, g(a) = a, g(b') = b', and stretches so that
/// grid points concentrate where the tabulated function is steep:
///
///   g(x) = a + (b' - a) * I(x) / I(b'),  I(x) = integral_a^x dt/sqrt(1 + f'(t)^2)
///
/// Only a degree NUM_COEFS-1 polynomial approximation q of g^{-1} is stored.
/// To keep the runtime grid consistent with the hash that will use q, g is
/// redefined after fitting as the Newton/bisection inverse of q itself.
///
/// The stored coefficients are baked for the fused hash: the constant term
/// is shifted by -a and everything is divided by the step size, so one
/// Horner evaluation of the stored polynomial returns "piece index plus
/// local fraction" directly.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    min_arg: f64,
    table_max: f64,
    step_size: f64,
    inv_coefs: [f64; NUM_COEFS],
    approx_method: &'static str,
}

impl TransferFunction {
    pub fn new(
        spec: &FunctionSpec,
        min_arg: f64,
        table_max: f64,
        step_size: f64,
    ) -> Result<Self, TableError> {
        if !spec.has_derivatives(1) {
            return Err(TableError::BadArgument(format!(
                "nonuniform grids need the first-derivative variant of '{}'",
                spec.name()
            )));
        }
        let probe = spec.derivatives(min_arg, 1)?;
        debug_assert!(probe.len() == 2);

        let integrand = |t: f64| {
            let d = spec.derivatives(t, 1).map(|v| v[1]).unwrap_or(f64::NAN);
            1.0 / (1.0 + d * d).sqrt()
        };

        // normalisation so that g(table_max) = table_max
        let c = quadrature::integrate(&integrand, min_arg, table_max);
        if !(c.is_finite() && c > 0.0) {
            return Err(TableError::Conditioning(format!(
                "arc-length normalisation integral is {} on [{}, {}]",
                c, min_arg, table_max
            )));
        }

        let g = |x: f64| {
            if x <= min_arg {
                return min_arg;
            }
            min_arg + (table_max - min_arg) * quadrature::integrate(&integrand, min_arg, x) / c
        };
        let g_prime = |x: f64| (table_max - min_arg) * integrand(x) / c;

        let candidates: [(
            &'static str,
            fn(&dyn Fn(f64) -> f64, &dyn Fn(f64) -> f64, f64, f64) -> Option<[f64; NUM_COEFS]>,
        ); 3] = [
            (
                "inverse_poly_interior_slopes_interp",
                inverse_poly_interior_slopes_interp,
            ),
            ("inverse_poly_interp", inverse_poly_interp),
            ("inverse_hermite_interp", inverse_hermite_interp),
        ];

        for (name, method) in candidates {
            let coefs = match method(&g, &g_prime, min_arg, table_max) {
                Some(c) => c,
                None => {
                    debug!("transfer candidate {} produced no solution", name);
                    continue;
                }
            };
            if !passes_checks(&coefs, min_arg, table_max) {
                debug!("transfer candidate {} rejected by quality checks", name);
                continue;
            }
            info!(
                "transfer function for '{}' uses {} on [{}, {}]",
                spec.name(),
                name,
                min_arg,
                table_max
            );
            let mut baked = coefs;
            baked[0] -= min_arg;
            for c in baked.iter_mut() {
                *c /= step_size;
            }
            return Ok(TransferFunction {
                min_arg,
                table_max,
                step_size,
                inv_coefs: baked,
                approx_method: name,
            });
        }

        Err(TableError::Conditioning(format!(
            "every polynomial approximation of the transfer inverse with {} coefficients \
             is too poorly conditioned on [{}, {}]",
            NUM_COEFS, min_arg, table_max
        )))
    }

    /// Rebuild from baked coefficients (the persisted form)
    pub fn from_coefs(
        min_arg: f64,
        table_max: f64,
        step_size: f64,
        inv_coefs: [f64; NUM_COEFS],
    ) -> Self {
        TransferFunction {
            min_arg,
            table_max,
            step_size,
            inv_coefs,
            approx_method: "restored",
        }
    }

    /// One Horner pass over the baked coefficients: integer part is the
    /// piece index, fractional part the local coordinate.
    #[inline]
    pub fn fused_inverse(&self, x: f64) -> f64 {
        horner(&self.inv_coefs, x)
    }

    /// The unbaked approximation q(x) of g^{-1}
    pub fn g_inv(&self, x: f64) -> f64 {
        self.min_arg + self.step_size * self.fused_inverse(x)
    }

    /// g evaluated as the inverse of the stored approximation, by Newton
    /// with a bisection fallback. Offline use only (grid construction).
    pub fn g(&self, x: f64) -> f64 {
        let unbaked: Vec<f64> = {
            let mut v: Vec<f64> = self.inv_coefs.iter().map(|c| c * self.step_size).collect();
            v[0] += self.min_arg;
            v
        };
        let deriv = derivative_coefs(&unbaked);
        invert_monotone(
            &|y| horner(&unbaked, y),
            &|y| horner(&deriv, y),
            x,
            self.min_arg,
            self.table_max,
        )
    }

    pub fn coefs(&self) -> [f64; NUM_COEFS] {
        self.inv_coefs
    }

    pub fn approx_method(&self) -> &'static str {
        self.approx_method
    }

    pub fn arg_bounds(&self) -> (f64, f64) {
        (self.min_arg, self.table_max)
    }
}

/// Solve g(y) = target for y in [a, b], Newton first, bisection when Newton
/// leaves the interval or stops making progress.
pub(crate) fn invert_monotone(
    g: &dyn Fn(f64) -> f64,
    g_prime: &dyn Fn(f64) -> f64,
    target: f64,
    a: f64,
    b: f64,
) -> f64 {
    let mut x = target.clamp(a, b);
    for _ in 0..MAX_NEWTON_IT {
        let d = g_prime(x);
        if d == 0.0 || !d.is_finite() {
            break;
        }
        let x_new = x - (g(x) - target) / d;
        if !x_new.is_finite() || x_new < a || x_new > b {
            break;
        }
        if (x_new - x).abs() <= NEWTON_TOL {
            return x_new;
        }
        x = x_new;
    }
    let (mut lo, mut hi) = (a, b);
    for _ in 0..MAX_BISECTION_IT {
        let mid = 0.5 * (lo + hi);
        if g(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// n points in [a, b] whose g-images are equispaced. Endpoints are pinned.
pub(crate) fn gspace(
    n: usize,
    g: &dyn Fn(f64) -> f64,
    g_prime: &dyn Fn(f64) -> f64,
    a: f64,
    b: f64,
) -> Vec<f64> {
    let mut v = vec![a; n];
    for (i, slot) in v.iter_mut().enumerate().take(n - 1).skip(1) {
        let target = a + (b - a) * (i as f64) / ((n - 1) as f64);
        *slot = invert_monotone(g, g_prime, target, a, b);
    }
    v[n - 1] = b;
    v
}

fn passes_checks(coefs: &[f64; NUM_COEFS], a: f64, b: f64) -> bool {
    if (horner(coefs, a) - a).abs() > ENDPOINT_TOL || (horner(coefs, b) - b).abs() > ENDPOINT_TOL {
        return false;
    }
    let mut prev = horner(coefs, a);
    for i in 1..=MONOTONE_PROBES {
        let x = a + (b - a) * (i as f64) / (MONOTONE_PROBES as f64);
        let value = horner(coefs, x);
        if value < prev {
            return false;
        }
        prev = value;
    }
    true
}

fn solve_vandermonde(a: DMatrix<f64>, rhs: DVector<f64>) -> Option<[f64; NUM_COEFS]> {
    let solution = a.full_piv_lu().solve(&rhs)?;
    let mut coefs = [0.0; NUM_COEFS];
    for i in 0..NUM_COEFS {
        if !solution[i].is_finite() {
            return None;
        }
        coefs[i] = solution[i];
    }
    Some(coefs)
}

/// Match q(g(y_i)) = y_i at K/2+1 gspace samples and q'(g(y_i)) = 1/g'(y_i)
/// at the interior samples.
fn inverse_poly_interior_slopes_interp(
    g: &dyn Fn(f64) -> f64,
    g_prime: &dyn Fn(f64) -> f64,
    a: f64,
    b: f64,
) -> Option<[f64; NUM_COEFS]> {
    if NUM_COEFS % 2 != 0 {
        return None;
    }
    let m = NUM_COEFS / 2 + 1;
    let y = gspace(m, g, g_prime, a, b);

    let mut mat = DMatrix::zeros(NUM_COEFS, NUM_COEFS);
    let mut rhs = DVector::zeros(NUM_COEFS);
    for i in 0..m {
        // by construction g(y[i]) is the i-th equispaced point
        let s = a + (b - a) * (i as f64) / ((m - 1) as f64);
        for j in 0..NUM_COEFS {
            mat[(i, j)] = s.powi(j as i32);
        }
        rhs[i] = y[i];
    }
    for i in 1..m - 1 {
        let s = a + (b - a) * (i as f64) / ((m - 1) as f64);
        let row = m + i - 1;
        for j in 1..NUM_COEFS {
            mat[(row, j)] = (j as f64) * s.powi(j as i32 - 1);
        }
        let slope = g_prime(y[i]);
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        rhs[row] = 1.0 / slope;
    }
    solve_vandermonde(mat, rhs)
}

/// Match q at NUM_COEFS gspace samples only
fn inverse_poly_interp(
    g: &dyn Fn(f64) -> f64,
    g_prime: &dyn Fn(f64) -> f64,
    a: f64,
    b: f64,
) -> Option<[f64; NUM_COEFS]> {
    let y = gspace(NUM_COEFS, g, g_prime, a, b);
    let mut mat = DMatrix::zeros(NUM_COEFS, NUM_COEFS);
    let mut rhs = DVector::zeros(NUM_COEFS);
    for i in 0..NUM_COEFS {
        let s = a + (b - a) * (i as f64) / ((NUM_COEFS - 1) as f64);
        for j in 0..NUM_COEFS {
            mat[(i, j)] = s.powi(j as i32);
        }
        rhs[i] = y[i];
    }
    solve_vandermonde(mat, rhs)
}

/// Match q at NUM_COEFS-2 gspace samples plus the slopes at both endpoints
fn inverse_hermite_interp(
    g: &dyn Fn(f64) -> f64,
    g_prime: &dyn Fn(f64) -> f64,
    a: f64,
    b: f64,
) -> Option<[f64; NUM_COEFS]> {
    if NUM_COEFS < 4 {
        return None;
    }
    let m = NUM_COEFS - 2;
    let y = gspace(m, g, g_prime, a, b);
    let mut mat = DMatrix::zeros(NUM_COEFS, NUM_COEFS);
    let mut rhs = DVector::zeros(NUM_COEFS);
    for i in 0..m {
        let s = a + (b - a) * (i as f64) / ((m - 1) as f64);
        for j in 0..NUM_COEFS {
            mat[(i, j)] = s.powi(j as i32);
        }
        rhs[i] = y[i];
    }
    for (row, (s, yv)) in [(a, y[0]), (b, y[m - 1])].into_iter().enumerate() {
        for j in 1..NUM_COEFS {
            mat[(m + row, j)] = (j as f64) * s.powi(j as i32 - 1);
        }
        let slope = g_prime(yv);
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        rhs[m + row] = 1.0 / slope;
    }
    solve_vandermonde(mat, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sin_spec() -> FunctionSpec {
        FunctionSpec::new("sin", |x: f64| x.sin())
            .with_derivatives(1, |x: f64| vec![x.sin(), x.cos()])
    }

    fn tanh5_spec() -> FunctionSpec {
        FunctionSpec::new("tanh5", |x: f64| (5.0 * x).tanh()).with_derivatives(1, |x: f64| {
            vec![(5.0 * x).tanh(), 5.0 / (5.0 * x).cosh().powi(2)]
        })
    }

    #[test]
    fn test_requires_first_derivative_variant() {
        let spec = FunctionSpec::new("plain", |x: f64| x.sin());
        let r = TransferFunction::new(&spec, 0.0, 1.0, 0.1);
        assert!(matches!(r, Err(TableError::BadArgument(_))));
    }

    #[test]
    fn test_endpoint_identities() {
        let spec = sin_spec();
        let tf = TransferFunction::new(&spec, 0.0, 1.0, 0.1).unwrap();
        assert_relative_eq!(tf.g(0.0), 0.0, epsilon = 1e-3);
        assert_relative_eq!(tf.g(1.0), 1.0, epsilon = 1e-3);
        assert_relative_eq!(tf.g_inv(0.0), 0.0, epsilon = 1e-3);
        assert_relative_eq!(tf.g_inv(1.0), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_g_is_monotone_at_200_points() {
        let spec = sin_spec();
        let tf = TransferFunction::new(&spec, 0.0, 1.0, 0.05).unwrap();
        let mut prev = tf.g(0.0);
        for i in 1..=200 {
            let x = (i as f64) / 200.0;
            let value = tf.g(x);
            assert!(
                value >= prev - 1e-9,
                "g not monotone at x = {}: {} < {}",
                x,
                value,
                prev
            );
            prev = value;
        }
    }

    #[test]
    fn test_fused_inverse_spans_index_range() {
        let spec = sin_spec();
        let h = 0.1;
        let tf = TransferFunction::new(&spec, 0.0, 1.0, h).unwrap();
        // baked polynomial carries the hash: near 0 at the left end and
        // near the interval count at the right end
        assert!(tf.fused_inverse(0.0).abs() < 0.1);
        assert_relative_eq!(tf.fused_inverse(1.0), 10.0, epsilon = 0.1);
    }

    #[test]
    fn test_g_inv_tracks_g() {
        let spec = tanh5_spec();
        let tf = TransferFunction::new(&spec, -1.0, 1.0, 0.125).unwrap();
        for i in 0..=20 {
            let x = -1.0 + 2.0 * (i as f64) / 20.0;
            let y = tf.g(x);
            assert_relative_eq!(tf.g_inv(y), x, epsilon = 5e-3);
        }
    }

    #[test]
    fn test_steep_exponential_is_rejected() {
        // g^{-1} for exp(7x) curves too hard for a cubic: every candidate
        // fails the monotonicity/endpoint checks
        let spec = FunctionSpec::new("exp7", |x: f64| (7.0 * x).exp())
            .with_derivatives(1, |x: f64| vec![(7.0 * x).exp(), 7.0 * (7.0 * x).exp()]);
        let r = TransferFunction::new(&spec, 0.0, 1.0, 0.0625);
        assert!(matches!(r, Err(TableError::Conditioning(_))));
    }

    #[test]
    fn test_coef_round_trip() {
        let spec = sin_spec();
        let tf = TransferFunction::new(&spec, 0.0, 1.0, 0.1).unwrap();
        let restored = TransferFunction::from_coefs(0.0, 1.0, 0.1, tf.coefs());
        for i in 0..=10 {
            let x = (i as f64) / 10.0;
            assert_eq!(tf.fused_inverse(x), restored.fused_inverse(x));
        }
    }

    #[test]
    fn test_gspace_images_are_equispaced() {
        let g = |x: f64| x * x; // monotone on [0, 1]
        let gp = |x: f64| 2.0 * x;
        let pts = gspace(5, &g, &gp, 0.0, 1.0);
        assert_eq!(pts[0], 0.0);
        assert_eq!(pts[4], 1.0);
        for (i, &p) in pts.iter().enumerate().take(4).skip(1) {
            assert_relative_eq!(g(p), (i as f64) / 4.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_invert_monotone_linear() {
        let g = |x: f64| 2.0 * x + 1.0;
        let gp = |_x: f64| 2.0;
        let y = invert_monotone(&g, &gp, 5.0, 0.0, 10.0);
        assert_relative_eq!(y, 2.0, epsilon = 1e-3);
    }
}
