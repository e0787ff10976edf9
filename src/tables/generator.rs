use crate::error::TableError;
use crate::functions::FunctionSpec;
use crate::numerical::brent::brent_minimize_scanned;
use crate::numerical::toms748::{toms748_solve, BRACKET_REL_TOL};
use crate::tables::meta::{AnyTable, TableParams};
use crate::tables::registry;
use crate::utils::{float_next, float_prior};
use log::{debug, info};
use std::io::Write;

// step-size solver configuration; the log-Newton phase is disabled by
// default and the bracketing phase carries the load
const N_NEWTON_MAX_IT: usize = 0;
const NEWTON_IT_RTOL: f64 = 1e-5;
const NEWTON_IT_ATOL: f64 = 1e-10;
const BRACKET_MAX_IT: usize = 50;
const BRENT_MAX_IT: usize = 20;
const ERROR_SCAN_POINTS: usize = 16;
// below this the measured relative error is roundoff, not truncation;
// a tolerance underneath it cannot be bracketed
const SOLVER_ERROR_FLOOR: f64 = 1e-14;
const MAX_SOLVER_INTERVALS: f64 = 100_000.0;

/// Builds lookup tables over a fixed function and argument range, choosing
/// the step size from a target accuracy or a memory budget.
pub struct TableGenerator<'a> {
    spec: &'a FunctionSpec,
    min_arg: f64,
    max_arg: f64,
}

impl<'a> TableGenerator<'a> {
    pub fn new(spec: &'a FunctionSpec, min_arg: f64, max_arg: f64) -> Result<Self, TableError> {
        if !(min_arg.is_finite() && max_arg.is_finite()) || max_arg <= min_arg {
            return Err(TableError::BadArgument(format!(
                "argument range [{}, {}] is empty or not finite",
                min_arg, max_arg
            )));
        }
        Ok(TableGenerator {
            spec,
            min_arg,
            max_arg,
        })
    }

    pub fn generate_by_step(&self, name: &str, step_size: f64) -> Result<AnyTable, TableError> {
        let params = TableParams::new(self.min_arg, self.max_arg, step_size)?;
        registry::create(name, self.spec, params)
    }

    /// Worst-case relative error of a built table over the argument range.
    ///
    /// Every grid interval is probed on its one-ULP-inset interior by
    /// minimising the negated relative difference with a scan-seeded Brent
    /// search. Probes are clipped at the requested max, so the sentinel
    /// overhang past it is never measured.
    pub fn worst_case_error_of(&self, table: &AnyTable) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..table.num_intervals() {
            let (lo, hi) = table.bounds_of_subinterval(i);
            if lo >= self.max_arg {
                break;
            }
            let x0 = float_next(lo);
            let x1 = float_prior(hi.min(self.max_arg));
            if x0 >= x1 {
                continue;
            }
            let negated_relative = |x: f64| {
                let exact = self.spec.eval(x);
                let approx = table.eval(x);
                let denom = exact.abs() + approx.abs();
                if denom == 0.0 {
                    0.0
                } else {
                    -2.0 * (exact - approx).abs() / denom
                }
            };
            let r = brent_minimize_scanned(negated_relative, x0, x1, ERROR_SCAN_POINTS, BRENT_MAX_IT);
            worst = worst.max(-r.fmin);
        }
        worst
    }

    /// Worst-case relative error of the named table at a given step size
    pub fn error_at_step_size(&self, name: &str, step_size: f64) -> Result<f64, TableError> {
        let table = self.generate_by_step(name, step_size)?;
        Ok(self.worst_case_error_of(&table))
    }

    /// Find the coarsest step whose worst-case error stays within the
    /// tolerance, then build at that step.
    pub fn generate_by_tol(&self, name: &str, tolerance: f64) -> Result<AnyTable, TableError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(TableError::BadArgument(format!(
                "tolerance must be positive, got {}",
                tolerance
            )));
        }
        let full_step = self.max_arg - self.min_arg;
        let coarse = self.generate_by_step(name, full_step)?;
        let coarse_gap = self.worst_case_error_of(&coarse) - tolerance;
        if coarse_gap <= 0.0 {
            info!(
                "{}: single-interval table already meets tolerance {:.3e}",
                name, tolerance
            );
            return Ok(coarse);
        }

        // phase A: Newton in log-log space using the known error order
        let order = coarse.order();
        let mut step = full_step / 1000.0;
        let log_tol = tolerance.ln();
        let mut newton_converged = false;
        for iteration in 0..N_NEWTON_MAX_IT {
            let err = self.error_at_step_size(name, step)?;
            if (err - tolerance).abs() < tolerance * NEWTON_IT_RTOL + NEWTON_IT_ATOL {
                newton_converged = true;
                debug!("log-Newton converged after {} iterations", iteration);
                break;
            }
            let log_step = step.ln() + (log_tol - err.ln()) / (order as f64);
            step = log_step.exp();
            debug!(
                "log-Newton iteration {}: step = {:.6e}, err = {:.3e}",
                iteration, step, err
            );
        }
        if !newton_converged && BRACKET_MAX_IT == 0 {
            return Err(TableError::Solver(format!(
                "log-Newton did not converge in {} steps and no bracketing iterations are configured",
                N_NEWTON_MAX_IT
            )));
        }

        // phase B: bracket E(h) - tol on (0, full_step]; both endpoint
        // values are known so neither endpoint is probed again
        let objective = |h: f64| -> Result<f64, TableError> {
            if full_step / h > MAX_SOLVER_INTERVALS {
                return Err(TableError::Solver(format!(
                    "tolerance {:.3e} for '{}' would need more than {} intervals",
                    tolerance, name, MAX_SOLVER_INTERVALS
                )));
            }
            let err = self.error_at_step_size(name, h)?;
            if err > tolerance && err <= SOLVER_ERROR_FLOOR {
                return Err(TableError::Solver(format!(
                    "tolerance {:.3e} is below the roundoff floor of '{}'",
                    tolerance, name
                )));
            }
            Ok(err - tolerance)
        };
        let (lower, upper) = toms748_solve(
            objective,
            0.0,
            full_step,
            -tolerance,
            coarse_gap,
            BRACKET_REL_TOL,
            BRACKET_MAX_IT,
        )?;
        debug!(
            "step-size bracket for {}: [{:.6e}, {:.6e}]",
            name, lower, upper
        );
        if lower <= 0.0 {
            return Err(TableError::Solver(format!(
                "tolerance {:.3e} is below what '{}' can reach on this range",
                tolerance, name
            )));
        }
        // the lower bracket satisfies the tolerance by construction
        let accepted = if lower < full_step { lower } else { full_step };
        info!(
            "{}: accepted step {:.6e} for tolerance {:.3e}",
            name, accepted, tolerance
        );
        self.generate_by_step(name, accepted)
    }

    /// Pick the step so the table costs roughly the given number of bytes.
    /// Two probe tables linearise size(h); no refinement afterwards.
    pub fn generate_by_size(&self, name: &str, bytes: usize) -> Result<AnyTable, TableError> {
        const N1: f64 = 2.0;
        const N2: f64 = 10.0;
        let span = self.max_arg - self.min_arg;
        let t1 = self.generate_by_step(name, span / N1)?;
        let t2 = self.generate_by_step(name, span / N2)?;
        let s1 = t1.data_size() as f64;
        let s2 = t2.data_size() as f64;
        if s1 == s2 {
            return Err(TableError::BadArgument(
                "size probe tables came out identical; cannot linearise".to_string(),
            ));
        }
        let intervals = (N1 + (N2 - N1) * ((bytes as f64) - s1) / (s2 - s1)).max(1.0);
        debug!(
            "{}: {} bytes maps to about {:.1} intervals",
            name, bytes, intervals
        );
        self.generate_by_step(name, span / intervals)
    }

    /// Write "x f(x) table(x)" rows at a tenth of the step spacing, for
    /// eyeballing an implementation against the function it replaces.
    pub fn dump_implementation_at_step_size<W: Write>(
        &self,
        name: &str,
        step_size: f64,
        out: &mut W,
    ) -> Result<(), TableError> {
        let table = self.generate_by_step(name, step_size)?;
        let io_err = |e: std::io::Error| TableError::Persistence(format!("dump failed: {}", e));
        writeln!(out, "# x f(x) {}", name).map_err(io_err)?;
        let mut x = self.min_arg;
        while x < self.max_arg {
            writeln!(out, "{} {} {}", x, self.spec.eval(x), table.eval(x)).map_err(io_err)?;
            x += step_size / 10.0;
        }
        Ok(())
    }
}
