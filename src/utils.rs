use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Set up console logging for examples and tests. Safe to call more than
/// once; only the first call installs a logger.
pub fn init_console_logging(filter: LevelFilter) {
    let _ = TermLogger::init(
        filter,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

/// Next representable f64 above x
pub fn float_next(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Next representable f64 below x
pub fn float_prior(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return x;
    }
    if x == 0.0 {
        return -f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_next_is_one_ulp_up() {
        let x = 1.0;
        let up = float_next(x);
        assert!(up > x);
        assert_eq!(float_prior(up), x);
    }

    #[test]
    fn test_float_prior_is_one_ulp_down() {
        let x = 0.1;
        let down = float_prior(x);
        assert!(down < x);
        assert_eq!(float_next(down), x);
    }

    #[test]
    fn test_zero_crossing() {
        assert!(float_next(0.0) > 0.0);
        assert!(float_prior(0.0) < 0.0);
        assert!(float_next(-f64::from_bits(1)) == 0.0);
    }

    #[test]
    fn test_negative_direction() {
        let x = -2.0;
        assert!(float_next(x) > x);
        assert!(float_prior(x) < x);
    }
}
