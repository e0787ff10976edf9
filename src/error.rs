use std::fmt;

/// Error types for table construction, generation and lookup
#[derive(Debug, Clone)]
pub enum TableError {
    /// bad user input: nonpositive step size, reversed bounds, unknown table
    /// name, or a FunctionSpec missing a required derivative variant
    BadArgument(String),
    /// no polynomial approximation of the transfer function inverse passed
    /// the endpoint/monotonicity checks
    Conditioning(String),
    /// the step-size solver failed to converge inside its iteration caps
    Solver(String),
    /// a composite table was queried outside the union of its sub-ranges
    Domain(String),
    /// a persisted table descriptor is malformed or missing fields
    Persistence(String),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TableError::BadArgument(msg) => write!(f, "Bad argument: {}", msg),
            TableError::Conditioning(msg) => write!(f, "Conditioning failure: {}", msg),
            TableError::Solver(msg) => write!(f, "Solver failure: {}", msg),
            TableError::Domain(msg) => write!(f, "Domain error: {}", msg),
            TableError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
        }
    }
}

impl std::error::Error for TableError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        let e = TableError::BadArgument("stepSize must be positive".to_string());
        assert_eq!(e.to_string(), "Bad argument: stepSize must be positive");
        let e = TableError::Domain("x=2.5 outside all sub-tables".to_string());
        assert!(e.to_string().starts_with("Domain error"));
    }
}
