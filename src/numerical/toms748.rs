use crate::error::TableError;
use log::{debug, warn};

/// Default relative width at which a bracket counts as resolved, about
/// 2^-23. Loose on purpose: the objective is itself a noisy estimate, so
/// squeezing the bracket to machine precision just thrashes.
pub const BRACKET_REL_TOL: f64 = 1.192_092_895_507_812_5e-7;

/// Bracketing root search on [a, b] with pre-evaluated endpoint values.
///
/// Keeps a sign-changing bracket at every step, trying a secant/inverse
/// quadratic candidate first and falling back to bisection whenever the
/// candidate leaves the bracket or shrinks it too slowly. The endpoints are
/// never re-evaluated, so a caller may seed an endpoint it cannot afford to
/// probe (e.g. step size zero).
///
/// Returns the final bracket `(lo, hi)` with `f(lo) <= 0 <= f(hi)` whenever
/// the initial data is oriented that way.
pub fn toms748_solve<F>(
    mut f: F,
    a: f64,
    b: f64,
    fa: f64,
    fb: f64,
    rel_tol: f64,
    max_iter: usize,
) -> Result<(f64, f64), TableError>
where
    F: FnMut(f64) -> Result<f64, TableError>,
{
    if a >= b {
        return Err(TableError::BadArgument(format!(
            "bracket endpoints are not ordered: [{}, {}]",
            a, b
        )));
    }
    if fa * fb > 0.0 {
        return Err(TableError::Solver(format!(
            "no sign change on bracket [{}, {}]: f = ({:.3e}, {:.3e})",
            a, b, fa, fb
        )));
    }

    // orient so that f(neg) <= 0 <= f(pos)
    let (mut neg, mut pos, mut fneg, mut fpos) = if fa <= 0.0 {
        (a, b, fa, fb)
    } else {
        (b, a, fb, fa)
    };

    // previous iterate, used for the inverse quadratic model
    let mut prev = pos;
    let mut fprev = fpos;

    // bracket width two iterations ago; interpolation must at least halve
    // the bracket every other step or the next step is a forced bisection
    let mut width_prev2 = f64::INFINITY;
    let mut width_prev = (pos - neg).abs();

    for it in 0..max_iter {
        let width = (pos - neg).abs();
        let scale = neg.abs().max(pos.abs()).max(1.0);
        if width <= rel_tol * scale {
            debug!("toms748_solve converged after {} iterations", it);
            return Ok(order(neg, pos));
        }

        let lo = neg.min(pos);
        let hi = neg.max(pos);

        let stalled = width > 0.5 * width_prev2;
        width_prev2 = width_prev;
        width_prev = width;

        // inverse quadratic through (neg, pos, prev) when the ordinates are
        // distinct, secant otherwise
        let mut c = if stalled {
            0.5 * (lo + hi)
        } else if fneg != fpos && fneg != fprev && fpos != fprev {
            neg * fpos * fprev / ((fneg - fpos) * (fneg - fprev))
                + pos * fneg * fprev / ((fpos - fneg) * (fpos - fprev))
                + prev * fneg * fpos / ((fprev - fneg) * (fprev - fpos))
        } else {
            neg - fneg * (pos - neg) / (fpos - fneg)
        };

        // reject candidates outside or hugging the bracket
        let margin = 0.01 * width;
        if !c.is_finite() || c <= lo + margin || c >= hi - margin {
            c = 0.5 * (lo + hi);
        }

        let fc = f(c)?;
        prev = if fc <= 0.0 { neg } else { pos };
        fprev = if fc <= 0.0 { fneg } else { fpos };
        if fc <= 0.0 {
            neg = c;
            fneg = fc;
        } else {
            pos = c;
            fpos = fc;
        }
        if fc == 0.0 {
            debug!("toms748_solve found exact root at {}", c);
            return Ok(order(neg, pos));
        }
    }

    let width = (pos - neg).abs();
    let scale = neg.abs().max(pos.abs()).max(1.0);
    if width <= rel_tol * scale {
        return Ok(order(neg, pos));
    }
    warn!(
        "toms748_solve: bracket [{:.6e}, {:.6e}] not resolved in {} iterations",
        neg.min(pos),
        neg.max(pos),
        max_iter
    );
    Err(TableError::Solver(format!(
        "bracketing root search did not converge in {} iterations",
        max_iter
    )))
}

fn order(x: f64, y: f64) -> (f64, f64) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}
