use crate::error::TableError;
use crate::functions::FunctionSpec;
use crate::tables::meta::{AnyTable, TableParams};
use crate::tables::registry;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Why a breakpoint between sub-ranges is special
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontType {
    None,
    Discont,
    FirstDiscont,
    SecondDiscont,
    ThirdDiscont,
}

/// How the function behaves as the breakpoint is approached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Equals,
    Approaches,
    Inf,
}

/// Breakpoint annotation: n+1 special points define the n abutting ranges
/// of a composite table.
#[derive(Debug, Clone, Copy)]
pub struct SpecialPoint {
    pub x: f64,
    pub y: f64,
    pub discont: DiscontType,
    pub limit: LimitType,
}

impl SpecialPoint {
    pub fn new(x: f64, y: f64, discont: DiscontType, limit: LimitType) -> Self {
        SpecialPoint {
            x,
            y,
            discont,
            limit,
        }
    }
}

/// Dispatcher over several lookup tables covering adjacent sub-ranges.
///
/// Lookup first tries the most-recently-used sub-table, then scans
/// neighbours linearly while the argument is close, and falls back to
/// binary search on the range list. The MRU hint is a plain index updated
/// with relaxed ordering: readers may observe a stale value, which only
/// costs them the fast path, never correctness.
pub struct CompositeTable {
    tables: Vec<AnyTable>,
    special_points: Vec<SpecialPoint>,
    mru: AtomicUsize,
    smallest_interval: f64,
    min_arg: f64,
    max_arg: f64,
    data_size: usize,
}

impl CompositeTable {
    /// Build one sub-table per name over the ranges cut by the special
    /// points. `names`, `step_sizes` and the interior of `special_points`
    /// line up index-by-index.
    pub fn new(
        spec: &FunctionSpec,
        names: Vec<String>,
        step_sizes: Vec<f64>,
        special_points: Vec<SpecialPoint>,
    ) -> Result<Self, TableError> {
        if names.is_empty() {
            return Err(TableError::BadArgument(
                "a composite table needs at least one sub-table".to_string(),
            ));
        }
        if names.len() != step_sizes.len() {
            return Err(TableError::BadArgument(format!(
                "{} sub-table name(s) need {} step size(s), got {}",
                names.len(),
                names.len(),
                step_sizes.len()
            )));
        }
        if special_points.len() != names.len() + 1 {
            return Err(TableError::BadArgument(format!(
                "{} sub-table(s) need {} special points, got {}",
                names.len(),
                names.len() + 1,
                special_points.len()
            )));
        }
        for window in special_points.windows(2) {
            if window[0].x >= window[1].x {
                return Err(TableError::BadArgument(format!(
                    "special points must be strictly increasing, got {} then {}",
                    window[0].x, window[1].x
                )));
            }
        }

        let mut tables = Vec::with_capacity(names.len());
        let mut smallest_interval = f64::MAX;
        let mut data_size = 0;
        for (i, name) in names.iter().enumerate() {
            let lo = special_points[i].x;
            let hi = special_points[i + 1].x;
            let params = TableParams::new(lo, hi, step_sizes[i])?;
            let table = registry::create(name, spec, params)?;
            smallest_interval = smallest_interval.min(hi - lo);
            data_size += table.data_size();
            tables.push(table);
        }
        debug!(
            "composite table over [{}, {}] with {} sub-tables",
            special_points[0].x,
            special_points[names.len()].x,
            tables.len()
        );

        let mru = tables.len() / 2;
        Ok(CompositeTable {
            min_arg: special_points[0].x,
            max_arg: special_points[special_points.len() - 1].x,
            tables,
            special_points,
            mru: AtomicUsize::new(mru),
            smallest_interval,
            data_size,
        })
    }

    pub fn min_arg(&self) -> f64 {
        self.min_arg
    }

    pub fn max_arg(&self) -> f64 {
        self.max_arg
    }

    pub fn num_sub_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn special_points(&self) -> &[SpecialPoint] {
        &self.special_points
    }

    pub fn sub_table(&self, i: usize) -> &AnyTable {
        &self.tables[i]
    }

    fn in_range(&self, i: usize, x: f64) -> bool {
        x >= self.tables[i].min_arg() && x <= self.tables[i].max_arg()
    }

    fn hit(&self, i: usize, x: f64) -> f64 {
        self.mru.store(i, Ordering::Relaxed);
        self.tables[i].eval(x)
    }

    /// Evaluate at x, or a domain error when x lies outside every
    /// sub-range.
    pub fn eval(&self, x: f64) -> Result<f64, TableError> {
        if x < self.min_arg || x > self.max_arg {
            return Err(TableError::Domain(format!(
                "composite table undefined for x = {} (range [{}, {}])",
                x, self.min_arg, self.max_arg
            )));
        }
        let recent = self.mru.load(Ordering::Relaxed).min(self.tables.len() - 1);
        let lo = self.tables[recent].min_arg();
        let hi = self.tables[recent].max_arg();
        if x >= lo && x <= hi {
            return Ok(self.tables[recent].eval(x));
        }
        let near = 2.0 * self.smallest_interval;
        if x < lo {
            if x >= lo - near {
                self.linear_search_left(recent, x)
            } else {
                self.binary_search(0, recent, x)
            }
        } else if x <= hi + near {
            self.linear_search_right(recent, x)
        } else {
            self.binary_search(recent, self.tables.len() - 1, x)
        }
    }

    fn linear_search_left(&self, from: usize, x: f64) -> Result<f64, TableError> {
        let mut i = from;
        while i > 0 {
            i -= 1;
            if self.in_range(i, x) {
                return Ok(self.hit(i, x));
            }
            if x > self.tables[i].max_arg() {
                break;
            }
        }
        Err(TableError::Domain(format!(
            "composite table undefined for x = {}",
            x
        )))
    }

    fn linear_search_right(&self, from: usize, x: f64) -> Result<f64, TableError> {
        let mut i = from;
        while i + 1 < self.tables.len() {
            i += 1;
            if self.in_range(i, x) {
                return Ok(self.hit(i, x));
            }
            if x < self.tables[i].min_arg() {
                break;
            }
        }
        Err(TableError::Domain(format!(
            "composite table undefined for x = {}",
            x
        )))
    }

    fn binary_search(&self, mut lo: usize, mut hi: usize, x: f64) -> Result<f64, TableError> {
        while lo <= hi {
            let mid = (lo + hi) / 2;
            if x < self.tables[mid].min_arg() {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            } else if x > self.tables[mid].max_arg() {
                lo = mid + 1;
            } else {
                return Ok(self.hit(mid, x));
            }
        }
        Err(TableError::Domain(format!(
            "composite table undefined for x = {}",
            x
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn abs_spec() -> FunctionSpec {
        FunctionSpec::new("abs", |x: f64| x.abs())
    }

    fn point(x: f64, y: f64) -> SpecialPoint {
        SpecialPoint::new(x, y, DiscontType::FirstDiscont, LimitType::Equals)
    }

    fn abs_composite() -> CompositeTable {
        CompositeTable::new(
            &abs_spec(),
            vec![
                "UniformLinearInterpolationTable".to_string(),
                "UniformLinearInterpolationTable".to_string(),
            ],
            vec![0.125, 0.125],
            vec![point(-1.0, 1.0), point(0.0, 0.0), point(1.0, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_absolute_value_composite() {
        let composite = abs_composite();
        assert_relative_eq!(composite.eval(-0.5).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(composite.eval(0.5).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(composite.eval(0.0).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_domain_raises() {
        let composite = abs_composite();
        assert!(matches!(
            composite.eval(-1.01),
            Err(TableError::Domain(_))
        ));
        assert!(matches!(composite.eval(1.5), Err(TableError::Domain(_))));
    }

    #[test]
    fn test_result_independent_of_mru_state() {
        let composite = abs_composite();
        // drive the hint around and verify answers never change
        let probes: [f64; 8] = [-0.9, 0.9, -0.1, 0.1, -0.9, 0.75, -0.75, 0.0];
        let expected: Vec<f64> = probes.iter().map(|x| x.abs()).collect();
        for _pass in 0..3 {
            for (x, want) in probes.iter().zip(&expected) {
                let got = composite.eval(*x).unwrap();
                assert_relative_eq!(got, *want, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_many_subtables_binary_search() {
        let spec = FunctionSpec::new("id", |x: f64| x);
        let n = 8;
        let names = vec!["UniformLinearInterpolationTable".to_string(); n];
        let steps = vec![0.25; n];
        let points: Vec<SpecialPoint> = (0..=n).map(|k| point(k as f64, k as f64)).collect();
        let composite = CompositeTable::new(&spec, names, steps, points).unwrap();
        assert_eq!(composite.num_sub_tables(), n);
        // far jumps exercise binary search on both sides
        for &x in &[0.1, 7.9, 0.4, 6.5, 3.25, 0.6, 7.2] {
            assert_relative_eq!(composite.eval(x).unwrap(), x, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_boundary_points_belong_to_either_neighbour() {
        let composite = abs_composite();
        // every breakpoint evaluates correctly no matter which neighbour
        // serves it
        for p in composite.special_points() {
            if p.x >= composite.min_arg() && p.x <= composite.max_arg() {
                let value = composite.eval(p.x).unwrap();
                assert_relative_eq!(value, p.x.abs(), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let r = CompositeTable::new(
            &abs_spec(),
            vec!["UniformLinearInterpolationTable".to_string()],
            vec![0.125, 0.125],
            vec![point(-1.0, 1.0), point(0.0, 0.0)],
        );
        assert!(matches!(r, Err(TableError::BadArgument(_))));
        let r = CompositeTable::new(
            &abs_spec(),
            vec!["UniformLinearInterpolationTable".to_string()],
            vec![0.125],
            vec![point(-1.0, 1.0)],
        );
        assert!(matches!(r, Err(TableError::BadArgument(_))));
    }

    #[test]
    fn test_unordered_points_rejected() {
        let r = CompositeTable::new(
            &abs_spec(),
            vec![
                "UniformLinearInterpolationTable".to_string(),
                "UniformLinearInterpolationTable".to_string(),
            ],
            vec![0.125, 0.125],
            vec![point(0.0, 0.0), point(-1.0, 1.0), point(1.0, 1.0)],
        );
        assert!(matches!(r, Err(TableError::BadArgument(_))));
    }

    #[test]
    fn test_mixed_families_per_range() {
        let spec = FunctionSpec::new("square", |x: f64| x * x);
        let composite = CompositeTable::new(
            &spec,
            vec![
                "UniformQuadraticInterpolationTable".to_string(),
                "UniformCubicInterpolationTable".to_string(),
            ],
            vec![0.25, 0.5],
            vec![point(0.0, 0.0), point(1.0, 1.0), point(3.0, 9.0)],
        )
        .unwrap();
        for &x in &[0.3, 0.9, 1.5, 2.9] {
            assert_relative_eq!(composite.eval(x).unwrap(), x * x, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_data_size_accumulates() {
        let composite = abs_composite();
        let total: usize = (0..composite.num_sub_tables())
            .map(|i| composite.sub_table(i).data_size())
            .sum();
        assert_eq!(composite.data_size(), total);
    }
}
