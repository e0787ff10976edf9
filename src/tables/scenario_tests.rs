// End-to-end checks that walk the whole pipeline the way a caller would:
// build by name, evaluate against the exact function, compare grid kinds,
// persist and reload.

#[cfg(test)]
mod tests {
    use crate::functions::FunctionSpec;
    use crate::tables::composite::{CompositeTable, DiscontType, LimitType, SpecialPoint};
    use crate::tables::descriptor::TableDescriptor;
    use crate::tables::meta::TableParams;
    use crate::tables::polynomial::horner;
    use crate::tables::{make_table, make_table_by_tolerance, make_table_from_descriptor};
    use approx::assert_relative_eq;

    fn sin_spec() -> FunctionSpec {
        FunctionSpec::new("sin", |x: f64| x.sin()).with_derivatives(3, |x: f64| {
            vec![x.sin(), x.cos(), -x.sin(), -x.cos()]
        })
    }

    fn tanh5_spec() -> FunctionSpec {
        FunctionSpec::new("tanh5", |x: f64| (5.0 * x).tanh()).with_derivatives(1, |x: f64| {
            vec![(5.0 * x).tanh(), 5.0 / (5.0 * x).cosh().powi(2)]
        })
    }

    fn runge_spec() -> FunctionSpec {
        let f = |x: f64| 1.0 / (1.0 + 25.0 * x * x);
        FunctionSpec::new("runge", f).with_derivatives(1, move |x: f64| {
            let u = 1.0 + 25.0 * x * x;
            vec![1.0 / u, -50.0 * x / (u * u)]
        })
    }

    fn max_error_on<F: Fn(f64) -> f64>(
        table: &crate::tables::meta::AnyTable,
        f: F,
        a: f64,
        b: f64,
        samples: usize,
    ) -> f64 {
        let mut worst: f64 = 0.0;
        for k in 0..=samples {
            let x = a + (b - a) * (k as f64) / (samples as f64);
            worst = worst.max((table.eval(x) - f(x)).abs());
        }
        worst
    }

    #[test]
    fn test_linear_sine_table_end_to_end() {
        let spec = sin_spec();
        let params = TableParams::new(0.0, 1.0, 0.1).unwrap();
        let table = make_table("UniformLinearInterpolationTable", &spec, params).unwrap();
        assert_eq!(table.eval(0.0), 0.0);
        assert_relative_eq!(table.eval(0.1), 0.1f64.sin(), epsilon = 1e-14);
        let midpoint = 0.5 * (0.0f64.sin() + 0.1f64.sin());
        assert!((table.eval(0.05) - midpoint).abs() < 5e-4);
    }

    #[test]
    fn test_hash_agrees_with_manual_piece_evaluation() {
        let spec = sin_spec();
        let params = TableParams::new(0.0, 1.0, 0.1).unwrap();
        let table = make_table("UniformQuadraticInterpolationTable", &spec, params).unwrap();
        let desc = table.describe();
        for k in 0..10 {
            // interior offsets keep the index away from boundary rounding
            let x = ((k as f64) + 0.3) * 0.1;
            let scaled = x / 0.1;
            let i = scaled as usize;
            let t = scaled - i as f64;
            let entry = &desc.table[&i.to_string()];
            let coefs: Vec<f64> = (0..3)
                .map(|j| entry.coefs[&j.to_string()])
                .collect();
            assert_relative_eq!(table.eval(x), horner(&coefs, t), epsilon = 1e-13);
        }
    }

    #[test]
    fn test_warped_grid_beats_uniform_on_steep_function() {
        // tanh(5x) has a narrow steep band around zero, which is exactly
        // what the arc-length warp targets
        let spec = tanh5_spec();
        let f = |x: f64| (5.0 * x).tanh();
        let params = TableParams::new(-1.0, 1.0, 0.125).unwrap();
        let uniform = make_table("UniformCubicInterpolationTable", &spec, params).unwrap();
        let warped = make_table("NonUniformCubicInterpolationTable", &spec, params).unwrap();
        assert_eq!(uniform.num_intervals(), warped.num_intervals());
        let uniform_err = max_error_on(&uniform, f, -1.0, 1.0, 50_000);
        let warped_err = max_error_on(&warped, f, -1.0, 1.0, 50_000);
        assert!(
            warped_err < uniform_err,
            "warped {} vs uniform {}",
            warped_err,
            uniform_err
        );
        assert!(warped_err < 1e-4);
    }

    #[test]
    fn test_runge_on_warped_grid_stays_accurate() {
        let spec = runge_spec();
        let f = |x: f64| 1.0 / (1.0 + 25.0 * x * x);
        let params = TableParams::new(-1.0, 1.0, 0.1).unwrap();
        let warped = make_table("NonUniformCubicInterpolationTable", &spec, params).unwrap();
        assert!(max_error_on(&warped, f, -1.0, 1.0, 50_000) < 1e-3);
    }

    #[test]
    fn test_pseudo_hash_is_a_looser_knob() {
        // the fused hash reuses the fitted inverse for the local
        // coordinate; accuracy degrades but stays bounded
        let spec = tanh5_spec();
        let f = |x: f64| (5.0 * x).tanh();
        let params = TableParams::new(-1.0, 1.0, 0.125).unwrap();
        let pseudo =
            make_table("NonUniformPseudoCubicInterpolationTable", &spec, params).unwrap();
        assert!(max_error_on(&pseudo, f, -1.0, 1.0, 50_000) < 5e-3);
    }

    #[test]
    fn test_tolerance_built_table_round_trips_through_descriptor() {
        let spec = sin_spec();
        let table =
            make_table_by_tolerance("UniformCubicInterpolationTable", &spec, 0.0, 1.0, 1e-5)
                .unwrap();
        let json = table.describe().to_json().unwrap();
        let restored =
            make_table_from_descriptor(&TableDescriptor::from_json(&json).unwrap()).unwrap();
        for k in 0..=100 {
            let x = (k as f64) / 100.0;
            assert_eq!(table.eval(x), restored.eval(x));
        }
    }

    #[test]
    fn test_composite_of_warped_and_uniform_ranges() {
        let spec = tanh5_spec();
        let f = |x: f64| (5.0 * x).tanh();
        let composite = CompositeTable::new(
            &spec,
            vec![
                "UniformCubicInterpolationTable".to_string(),
                "NonUniformCubicInterpolationTable".to_string(),
            ],
            vec![0.25, 0.125],
            vec![
                SpecialPoint::new(-2.0, f(-2.0), DiscontType::None, LimitType::Equals),
                SpecialPoint::new(-1.0, f(-1.0), DiscontType::None, LimitType::Equals),
                SpecialPoint::new(1.0, f(1.0), DiscontType::None, LimitType::Equals),
            ],
        )
        .unwrap();
        for k in 0..=300 {
            let x = -2.0 + 3.0 * (k as f64) / 300.0;
            assert!((composite.eval(x).unwrap() - f(x)).abs() < 5e-3);
        }
    }

    #[test]
    fn test_grid_nodes_match_function_within_residual() {
        let spec = sin_spec();
        let params = TableParams::new(0.0, 1.0, 0.125).unwrap();
        for name in [
            "UniformLinearInterpolationTable",
            "UniformQuadraticInterpolationTable",
            "UniformCubicInterpolationTable",
            "UniformCubicHermiteTable",
            "UniformQuarticSolvedInterpolationTable",
            "UniformCubicTaylorTable",
        ] {
            let table = make_table(name, &spec, params).unwrap();
            for k in 0..table.num_intervals() {
                let x = 0.125 * (k as f64);
                assert_relative_eq!(table.eval(x), x.sin(), epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_interval_count_invariants() {
        let spec = sin_spec();
        for h in [0.1, 0.125, 0.3, 0.7] {
            let params = TableParams::new(0.0, 1.0, h).unwrap();
            let table = make_table("UniformLinearInterpolationTable", &spec, params).unwrap();
            let n = table.num_intervals() as f64;
            assert!(n * h >= 1.0 - 1e-12);
            assert!(n * h < 1.0 + h + 1e-12);
            assert_eq!(table.num_table_entries(), table.num_intervals() + 1);
        }
    }
}
