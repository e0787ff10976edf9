use crate::error::TableError;
use std::collections::BTreeMap;
use std::fmt;

type ScalarFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;
type JetFn = Box<dyn Fn(f64) -> Vec<f64> + Send + Sync>;

/// Bundles a scalar function together with its derivative variants.
///
/// The k-th variant evaluates the same mathematical function but returns the
/// values `[f(x), f'(x), ..., f^(k)(x)]` at the point. Families that need
/// derivative data (Taylor, Hermite, Pade, nonuniform grids) request the
/// variant of the order they need; construction fails with `BadArgument`
/// when the spec does not supply it.
///
/// ```
/// use polylut::functions::FunctionSpec;
/// let spec = FunctionSpec::new("sin", |x: f64| x.sin())
///     .with_derivatives(1, |x: f64| vec![x.sin(), x.cos()]);
/// assert_eq!(spec.eval(0.0), 0.0);
/// assert!(spec.has_derivatives(1));
/// ```
pub struct FunctionSpec {
    name: String,
    func: ScalarFn,
    // keyed by the highest derivative order the closure returns
    jets: BTreeMap<usize, JetFn>,
}

impl FunctionSpec {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        FunctionSpec {
            name: name.into(),
            func: Box::new(f),
            jets: BTreeMap::new(),
        }
    }

    /// Register the variant returning derivatives up to `order`. The closure
    /// must return `order + 1` values: the function value followed by the
    /// derivatives in increasing order.
    pub fn with_derivatives<G>(mut self, order: usize, g: G) -> Self
    where
        G: Fn(f64) -> Vec<f64> + Send + Sync + 'static,
    {
        self.jets.insert(order, Box::new(g));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eval(&self, x: f64) -> f64 {
        (self.func)(x)
    }

    /// True if some registered variant covers derivatives up to `order`
    pub fn has_derivatives(&self, order: usize) -> bool {
        order == 0 || self.jets.range(order..).next().is_some()
    }

    pub fn max_derivative_order(&self) -> usize {
        self.jets.keys().next_back().copied().unwrap_or(0)
    }

    /// Values `[f(x), f'(x), ..., f^(order)(x)]`, taken from the smallest
    /// registered variant that covers `order`.
    pub fn derivatives(&self, x: f64, order: usize) -> Result<Vec<f64>, TableError> {
        if order == 0 {
            return Ok(vec![self.eval(x)]);
        }
        let (key, jet) = self.jets.range(order..).next().ok_or_else(|| {
            TableError::BadArgument(format!(
                "FunctionSpec '{}' has no derivative variant of order {}",
                self.name, order
            ))
        })?;
        let mut vals = jet(x);
        if vals.len() != key + 1 {
            return Err(TableError::BadArgument(format!(
                "derivative variant of order {} for '{}' returned {} values, expected {}",
                key,
                self.name,
                vals.len(),
                key + 1
            )));
        }
        vals.truncate(order + 1);
        Ok(vals)
    }
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("derivative_orders", &self.jets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Pass-through evaluator over the exact function. Used as the comparison
/// baseline when measuring table error.
pub struct DirectEvaluation<'a> {
    spec: &'a FunctionSpec,
}

impl<'a> DirectEvaluation<'a> {
    pub fn new(spec: &'a FunctionSpec) -> Self {
        DirectEvaluation { spec }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.spec.eval(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plain_function() {
        let spec = FunctionSpec::new("square", |x: f64| x * x);
        assert_eq!(spec.eval(3.0), 9.0);
        assert_eq!(spec.name(), "square");
        assert!(spec.has_derivatives(0));
        assert!(!spec.has_derivatives(1));
        assert_eq!(spec.max_derivative_order(), 0);
    }

    #[test]
    fn test_derivatives_exact_variant() {
        let spec = FunctionSpec::new("exp", |x: f64| x.exp())
            .with_derivatives(2, |x: f64| vec![x.exp(), x.exp(), x.exp()]);
        let d = spec.derivatives(1.0, 2).unwrap();
        assert_eq!(d.len(), 3);
        assert_relative_eq!(d[0], 1.0f64.exp());
        assert_relative_eq!(d[2], 1.0f64.exp());
    }

    #[test]
    fn test_derivatives_truncated_from_higher_variant() {
        let spec = FunctionSpec::new("sin", |x: f64| x.sin()).with_derivatives(3, |x: f64| {
            vec![x.sin(), x.cos(), -x.sin(), -x.cos()]
        });
        let d = spec.derivatives(0.5, 1).unwrap();
        assert_eq!(d.len(), 2);
        assert_relative_eq!(d[1], 0.5f64.cos());
        assert!(spec.has_derivatives(2));
        assert!(!spec.has_derivatives(4));
    }

    #[test]
    fn test_missing_variant_is_bad_argument() {
        let spec = FunctionSpec::new("id", |x: f64| x);
        let err = spec.derivatives(0.0, 1).unwrap_err();
        assert!(matches!(err, TableError::BadArgument(_)));
    }

    #[test]
    fn test_wrong_length_variant_is_rejected() {
        let spec =
            FunctionSpec::new("bad", |x: f64| x).with_derivatives(2, |x: f64| vec![x, 1.0]);
        assert!(spec.derivatives(0.0, 1).is_err());
    }

    #[test]
    fn test_direct_evaluation() {
        let spec = FunctionSpec::new("cube", |x: f64| x * x * x);
        let direct = DirectEvaluation::new(&spec);
        assert_eq!(direct.eval(2.0), 8.0);
    }

    #[test]
    fn test_order_zero_never_fails() {
        let spec = FunctionSpec::new("id", |x: f64| x);
        let d = spec.derivatives(4.0, 0).unwrap();
        assert_eq!(d, vec![4.0]);
    }
}
