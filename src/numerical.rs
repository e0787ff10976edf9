/// Scalar numerics used while building lookup tables: minima search for
/// worst-case error probing, a bracketing root finder for the step-size
/// solver, and adaptive quadrature for transfer-function construction.
///
/// ```
/// use polylut::numerical::brent::brent_minimize;
/// let r = brent_minimize(|x| (x - 1.5) * (x - 1.5), 0.0, 3.0, 50);
/// assert!((r.xmin - 1.5).abs() < 1e-6);
/// ```
pub mod brent;
pub mod quadrature;
pub mod toms748;
