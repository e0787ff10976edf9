use crate::error::TableError;
use crate::tables::meta::{AnyTable, GridKind, Table, TableParams};
use crate::tables::pade::restore_pade;
use crate::tables::polynomial::PolynomialPiece;
use crate::tables::registry::is_registered;
use crate::tables::transfer::{TransferFunction, NUM_COEFS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const COMMENT: &str = "polylut lookup table data";

/// Persisted form of a table: everything needed to rebuild it without
/// re-evaluating the tabulated function. Field names are part of the
/// stored format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(rename = "_comment")]
    pub comment: String,
    pub name: String,
    #[serde(rename = "minArg")]
    pub min_arg: f64,
    #[serde(rename = "maxArg")]
    pub max_arg: f64,
    #[serde(rename = "stepSize")]
    pub step_size: f64,
    #[serde(rename = "numTableEntries")]
    pub num_table_entries: usize,
    #[serde(rename = "numIntervals")]
    pub num_intervals: usize,
    #[serde(rename = "tableMaxArg")]
    pub table_max_arg: f64,
    pub order: usize,
    #[serde(rename = "dataSize")]
    pub data_size: usize,
    pub transfer_function_coefs: [f64; NUM_COEFS],
    #[serde(
        rename = "numeratorDegree",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub numerator_degree: Option<usize>,
    #[serde(
        rename = "denominatorDegree",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub denominator_degree: Option<usize>,
    pub table: BTreeMap<String, TableEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub coefs: BTreeMap<String, f64>,
}

impl TableDescriptor {
    pub fn to_json(&self) -> Result<String, TableError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TableError::Persistence(format!("descriptor serialization failed: {}", e)))
    }

    pub fn from_json(text: &str) -> Result<TableDescriptor, TableError> {
        serde_json::from_str(text)
            .map_err(|e| TableError::Persistence(format!("descriptor is malformed: {}", e)))
    }
}

impl AnyTable {
    /// Snapshot the table state for persistence
    pub fn describe(&self) -> TableDescriptor {
        let mut table = BTreeMap::new();
        for i in 0..self.num_table_entries() {
            let mut coefs = BTreeMap::new();
            for j in 0..self.ncoefs_per_entry() {
                coefs.insert(j.to_string(), self.table_entry(i, j));
            }
            table.insert(i.to_string(), TableEntry { coefs });
        }
        let (numerator_degree, denominator_degree) = match self {
            AnyTable::Pade(p) => (Some(p.num_degree()), Some(p.den_degree())),
            _ => (None, None),
        };
        TableDescriptor {
            comment: COMMENT.to_string(),
            name: self.name().to_string(),
            min_arg: self.min_arg(),
            max_arg: self.max_arg(),
            step_size: self.step_size(),
            num_table_entries: self.num_table_entries(),
            num_intervals: self.num_intervals(),
            table_max_arg: self.table_max_arg(),
            order: self.order(),
            data_size: self.data_size(),
            transfer_function_coefs: self
                .transfer_function()
                .map(|tf| tf.coefs())
                .unwrap_or([0.0; NUM_COEFS]),
            numerator_degree,
            denominator_degree,
            table,
        }
    }
}

fn entry_coefs<const N: usize>(
    desc: &TableDescriptor,
    i: usize,
) -> Result<PolynomialPiece<N>, TableError> {
    let entry = desc.table.get(&i.to_string()).ok_or_else(|| {
        TableError::Persistence(format!("descriptor is missing table entry {}", i))
    })?;
    let mut coefs = [0.0; N];
    for (j, c) in coefs.iter_mut().enumerate() {
        *c = *entry.coefs.get(&j.to_string()).ok_or_else(|| {
            TableError::Persistence(format!(
                "descriptor entry {} is missing coefficient {}",
                i, j
            ))
        })?;
    }
    Ok(PolynomialPiece::new(coefs))
}

fn rebuild_poly<const N: usize>(
    desc: &TableDescriptor,
    params: TableParams,
    kind: GridKind,
) -> Result<AnyTable, TableError>
where
    AnyTable: From<Table<N>>,
{
    let transfer = match kind {
        GridKind::Uniform => None,
        _ => Some(TransferFunction::from_coefs(
            desc.min_arg,
            desc.table_max_arg,
            desc.step_size,
            desc.transfer_function_coefs,
        )),
    };
    let mut pieces = Vec::with_capacity(desc.num_table_entries);
    for i in 0..desc.num_table_entries {
        pieces.push(entry_coefs::<N>(desc, i)?);
    }
    Table::<N>::assemble(desc.name.clone(), desc.order, params, kind, transfer, pieces)
        .map_err(|e| TableError::Persistence(e.to_string()))
        .map(Into::into)
}

/// Number of stored coefficients for each known polynomial family root
fn ncoefs_for_root(root: &str) -> Option<usize> {
    match root {
        "ConstantTaylorTable" => Some(1),
        "LinearTaylorTable" | "LinearInterpolationTable" => Some(2),
        "QuadraticTaylorTable" | "QuadraticInterpolationTable" => Some(3),
        "CubicTaylorTable" | "CubicInterpolationTable" | "CubicHermiteTable" => Some(4),
        "QuarticSolvedInterpolationTable" => Some(5),
        "QuinticSolvedInterpolationTable" => Some(6),
        "SexticSolvedInterpolationTable" => Some(7),
        "SepticSolvedInterpolationTable" => Some(8),
        _ => None,
    }
}

fn pade_degrees_from(desc: &TableDescriptor, root: &str) -> Result<(usize, usize), TableError> {
    if let (Some(m), Some(n)) = (desc.numerator_degree, desc.denominator_degree) {
        return Ok((m, n));
    }
    // fall back to the degrees encoded in the name, "PadeTable<m,n>"
    let inner = root
        .strip_prefix("PadeTable<")
        .and_then(|s| s.strip_suffix('>'))
        .ok_or_else(|| {
            TableError::Persistence(format!("cannot read Pade degrees from '{}'", desc.name))
        })?;
    let mut parts = inner.splitn(2, ',');
    let m = parts
        .next()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or_else(|| TableError::Persistence("bad Pade numerator degree".to_string()))?;
    let n = parts
        .next()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or_else(|| TableError::Persistence("bad Pade denominator degree".to_string()))?;
    Ok((m, n))
}

/// Rebuild a table from its persisted descriptor. The function itself is
/// not needed: every coefficient comes from the stored state.
pub fn table_from_descriptor(desc: &TableDescriptor) -> Result<AnyTable, TableError> {
    if !is_registered(&desc.name) {
        return Err(TableError::BadArgument(format!(
            "descriptor names unknown table '{}'",
            desc.name
        )));
    }
    let (kind, root) = GridKind::from_table_name(&desc.name).ok_or_else(|| {
        TableError::BadArgument(format!("descriptor names unknown table '{}'", desc.name))
    })?;
    let params = TableParams::new(desc.min_arg, desc.max_arg, desc.step_size)?;
    if params.num_intervals() != desc.num_intervals
        || desc.num_table_entries != desc.num_intervals + 1
    {
        return Err(TableError::Persistence(format!(
            "descriptor interval counts are inconsistent for '{}'",
            desc.name
        )));
    }

    if root.starts_with("PadeTable<") {
        let (m, n) = pade_degrees_from(desc, root)?;
        if m == 0 || m + n + 1 > 8 {
            return Err(TableError::Persistence(format!(
                "Pade degrees [{}/{}] are out of range",
                m, n
            )));
        }
        let mut pieces = Vec::with_capacity(desc.num_table_entries);
        for i in 0..desc.num_table_entries {
            // only the m+n+1 stored coefficients; the rest of the record
            // stays zero
            let entry = desc.table.get(&i.to_string()).ok_or_else(|| {
                TableError::Persistence(format!("descriptor is missing table entry {}", i))
            })?;
            let mut coefs = [0.0; 8];
            for (j, c) in coefs.iter_mut().enumerate().take(m + n + 1) {
                *c = *entry.coefs.get(&j.to_string()).ok_or_else(|| {
                    TableError::Persistence(format!(
                        "descriptor entry {} is missing coefficient {}",
                        i, j
                    ))
                })?;
            }
            pieces.push(PolynomialPiece::new(coefs));
        }
        return restore_pade(desc.name.clone(), desc.order, params, m, n, pieces)
            .map(Into::into);
    }

    match ncoefs_for_root(root) {
        Some(1) => rebuild_poly::<1>(desc, params, kind),
        Some(2) => rebuild_poly::<2>(desc, params, kind),
        Some(3) => rebuild_poly::<3>(desc, params, kind),
        Some(4) => rebuild_poly::<4>(desc, params, kind),
        Some(5) => rebuild_poly::<5>(desc, params, kind),
        Some(6) => rebuild_poly::<6>(desc, params, kind),
        Some(7) => rebuild_poly::<7>(desc, params, kind),
        Some(8) => rebuild_poly::<8>(desc, params, kind),
        _ => Err(TableError::BadArgument(format!(
            "descriptor names unknown table '{}'",
            desc.name
        ))),
    }
}

/// Rebuild and verify that the descriptor carries the expected table name
pub fn table_from_descriptor_checked(
    desc: &TableDescriptor,
    expected_name: &str,
) -> Result<AnyTable, TableError> {
    if desc.name != expected_name {
        return Err(TableError::BadArgument(format!(
            "descriptor holds '{}' but '{}' was requested",
            desc.name, expected_name
        )));
    }
    table_from_descriptor(desc)
}
