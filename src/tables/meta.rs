use crate::error::TableError;
use crate::tables::pade::PadeTable;
use crate::tables::polynomial::PolynomialPiece;
use crate::tables::transfer::TransferFunction;

/// How grid points are distributed over the argument range.
///
/// `NonUniform` warps the grid with a transfer function and keeps each
/// piece's polynomial in the raw argument, so only the piece index comes
/// from the fitted inverse. `NonUniformPseudo` also takes the local
/// coordinate from the fitted inverse ("fused hash"), trading a little
/// interpolation accuracy for a hash as cheap as the uniform one. The
/// accuracy gap between the two is a user-facing knob, not a bounded
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    Uniform,
    NonUniform,
    NonUniformPseudo,
}

impl GridKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            GridKind::Uniform => "Uniform",
            GridKind::NonUniform => "NonUniform",
            GridKind::NonUniformPseudo => "NonUniformPseudo",
        }
    }

    pub fn from_table_name(name: &str) -> Option<(GridKind, &str)> {
        // longest prefix first
        if let Some(rest) = name.strip_prefix("NonUniformPseudo") {
            Some((GridKind::NonUniformPseudo, rest))
        } else if let Some(rest) = name.strip_prefix("NonUniform") {
            Some((GridKind::NonUniform, rest))
        } else {
            name.strip_prefix("Uniform")
                .map(|rest| (GridKind::Uniform, rest))
        }
    }
}

/// User-requested argument range and grid spacing
#[derive(Debug, Clone, Copy)]
pub struct TableParams {
    pub min_arg: f64,
    pub max_arg: f64,
    pub step_size: f64,
}

impl TableParams {
    pub fn new(min_arg: f64, max_arg: f64, step_size: f64) -> Result<Self, TableError> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(TableError::BadArgument(format!(
                "stepSize must be positive, got {}",
                step_size
            )));
        }
        if !(min_arg.is_finite() && max_arg.is_finite()) || max_arg <= min_arg {
            return Err(TableError::BadArgument(format!(
                "argument range [{}, {}] is empty or not finite",
                min_arg, max_arg
            )));
        }
        Ok(TableParams {
            min_arg,
            max_arg,
            step_size,
        })
    }

    /// Number of grid intervals; the step is never shrunk, so the real
    /// table max can exceed the requested max.
    pub fn num_intervals(&self) -> usize {
        ((self.max_arg - self.min_arg) / self.step_size).ceil() as usize
    }

    pub fn table_max(&self) -> f64 {
        self.min_arg + self.step_size * (self.num_intervals() as f64)
    }
}

/// A piecewise-polynomial lookup table over a fixed grid.
///
/// Holds N coefficients per piece plus one sentinel piece past the end, so
/// an evaluation at the table max lands on a valid entry. Immutable after
/// construction; evaluation is pure.
#[derive(Debug, Clone)]
pub struct Table<const N: usize> {
    name: String,
    order: usize,
    min_arg: f64,
    max_arg: f64,
    step_size: f64,
    step_size_inv: f64,
    table_max: f64,
    num_intervals: usize,
    kind: GridKind,
    transfer: Option<TransferFunction>,
    pieces: Vec<PolynomialPiece<N>>,
}

impl<const N: usize> Table<N> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        name: String,
        order: usize,
        params: TableParams,
        kind: GridKind,
        transfer: Option<TransferFunction>,
        pieces: Vec<PolynomialPiece<N>>,
    ) -> Result<Self, TableError> {
        let num_intervals = params.num_intervals();
        if pieces.len() != num_intervals + 1 {
            return Err(TableError::BadArgument(format!(
                "table '{}' needs {} entries, got {}",
                name,
                num_intervals + 1,
                pieces.len()
            )));
        }
        if kind != GridKind::Uniform && transfer.is_none() {
            return Err(TableError::BadArgument(format!(
                "nonuniform table '{}' is missing its transfer function",
                name
            )));
        }
        Ok(Table {
            name,
            order,
            min_arg: params.min_arg,
            max_arg: params.max_arg,
            step_size: params.step_size,
            step_size_inv: 1.0 / params.step_size,
            table_max: params.table_max(),
            num_intervals,
            kind,
            transfer,
            pieces,
        })
    }

    /// Map an argument to (piece index, local coordinate)
    #[inline]
    pub fn hash(&self, x: f64) -> (usize, f64) {
        match self.kind {
            GridKind::Uniform => {
                let dx = (x - self.min_arg) * self.step_size_inv;
                let i = (dx as usize).min(self.num_intervals);
                (i, dx - i as f64)
            }
            GridKind::NonUniform => {
                // pieces are polynomials in the raw argument; only the
                // index comes from the fused inverse
                let u = self.transfer.as_ref().map_or(0.0, |t| t.fused_inverse(x));
                ((u as usize).min(self.num_intervals), x)
            }
            GridKind::NonUniformPseudo => {
                let u = self.transfer.as_ref().map_or(0.0, |t| t.fused_inverse(x));
                let i = (u as usize).min(self.num_intervals);
                (i, u - i as f64)
            }
        }
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        let (i, t) = self.hash(x);
        self.pieces[i].eval(t)
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
        N
    }

    pub fn kind(&self) -> GridKind {
        self.kind
    }

    pub fn piece(&self, i: usize) -> &PolynomialPiece<N> {
        &self.pieces[i]
    }

    pub fn transfer_function(&self) -> Option<&TransferFunction> {
        self.transfer.as_ref()
    }

    /// Bytes held in the coefficient array
    pub fn data_size(&self) -> usize {
        std::mem::size_of::<PolynomialPiece<N>>() * self.pieces.len()
    }

    /// Argument bounds of one grid interval
    pub fn bounds_of_subinterval(&self, i: usize) -> (f64, f64) {
        let lo = self.min_arg + (i as f64) * self.step_size;
        let hi = self.min_arg + ((i + 1) as f64) * self.step_size;
        match (&self.kind, &self.transfer) {
            (GridKind::Uniform, _) | (_, None) => (lo, hi),
            (_, Some(tf)) => (tf.g(lo), tf.g(hi)),
        }
    }
}

/// Closed set of table layouts the registry can produce. The family tag is
/// resolved at construction; evaluation only switches on the variant.
#[derive(Debug, Clone)]
pub enum AnyTable {
    N1(Table<1>),
    N2(Table<2>),
    N3(Table<3>),
    N4(Table<4>),
    N5(Table<5>),
    N6(Table<6>),
    N7(Table<7>),
    N8(Table<8>),
    Pade(PadeTable),
}

macro_rules! dispatch_table {
    ($self:expr, $t:ident => $body:expr) => {
        match $self {
            AnyTable::N1($t) => $body,
            AnyTable::N2($t) => $body,
            AnyTable::N3($t) => $body,
            AnyTable::N4($t) => $body,
            AnyTable::N5($t) => $body,
            AnyTable::N6($t) => $body,
            AnyTable::N7($t) => $body,
            AnyTable::N8($t) => $body,
            AnyTable::Pade($t) => $body,
        }
    };
}

impl AnyTable {
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        dispatch_table!(self, t => t.eval(x))
    }

    pub fn name(&self) -> &str {
        dispatch_table!(self, t => t.name())
    }

    pub fn order(&self) -> usize {
        dispatch_table!(self, t => t.order())
    }

    pub fn min_arg(&self) -> f64 {
        dispatch_table!(self, t => t.min_arg())
    }

    pub fn max_arg(&self) -> f64 {
        dispatch_table!(self, t => t.max_arg())
    }

    pub fn table_max_arg(&self) -> f64 {
        dispatch_table!(self, t => t.table_max_arg())
    }

    pub fn step_size(&self) -> f64 {
        dispatch_table!(self, t => t.step_size())
    }

    pub fn num_intervals(&self) -> usize {
        dispatch_table!(self, t => t.num_intervals())
    }

    pub fn num_table_entries(&self) -> usize {
        dispatch_table!(self, t => t.num_table_entries())
    }

    pub fn ncoefs_per_entry(&self) -> usize {
        dispatch_table!(self, t => t.ncoefs_per_entry())
    }

    pub fn data_size(&self) -> usize {
        dispatch_table!(self, t => t.data_size())
    }

    pub fn bounds_of_subinterval(&self, i: usize) -> (f64, f64) {
        dispatch_table!(self, t => t.bounds_of_subinterval(i))
    }

    /// Coefficient j of table entry i, as stored
    pub fn table_entry(&self, i: usize, j: usize) -> f64 {
        match self {
            AnyTable::N1(t) => t.piece(i).coefs[j],
            AnyTable::N2(t) => t.piece(i).coefs[j],
            AnyTable::N3(t) => t.piece(i).coefs[j],
            AnyTable::N4(t) => t.piece(i).coefs[j],
            AnyTable::N5(t) => t.piece(i).coefs[j],
            AnyTable::N6(t) => t.piece(i).coefs[j],
            AnyTable::N7(t) => t.piece(i).coefs[j],
            AnyTable::N8(t) => t.piece(i).coefs[j],
            AnyTable::Pade(t) => t.piece_coef(i, j),
        }
    }

    pub fn transfer_function(&self) -> Option<&TransferFunction> {
        match self {
            AnyTable::N1(t) => t.transfer_function(),
            AnyTable::N2(t) => t.transfer_function(),
            AnyTable::N3(t) => t.transfer_function(),
            AnyTable::N4(t) => t.transfer_function(),
            AnyTable::N5(t) => t.transfer_function(),
            AnyTable::N6(t) => t.transfer_function(),
            AnyTable::N7(t) => t.transfer_function(),
            AnyTable::N8(t) => t.transfer_function(),
            AnyTable::Pade(_) => None,
        }
    }
}

macro_rules! impl_from_table {
    ($($n:literal => $variant:ident),*) => {
        $(impl From<Table<$n>> for AnyTable {
            fn from(t: Table<$n>) -> AnyTable {
                AnyTable::$variant(t)
            }
        })*
    };
}

impl_from_table!(1 => N1, 2 => N2, 3 => N3, 4 => N4, 5 => N5, 6 => N6, 7 => N7, 8 => N8);

impl From<PadeTable> for AnyTable {
    fn from(t: PadeTable) -> AnyTable {
        AnyTable::Pade(t)
    }
}
