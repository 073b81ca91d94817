//! Dataset and metadata schemas
//!
//! A dataset is a pair of CSV files sharing a prefix:
//! - `<prefix>data.csv`: one row per brew (parameter columns + one score column per person)
//! - `<prefix>meta.csv`: one row per column describing it (`type`, `name`, `unit`,
//!   `low`, `high`, `step`, `parameter type`)
//!
//! Cells are coerced on ingress: trimmed, empty becomes absent, finite numbers
//! become [`CellValue::Number`], anything else [`CellValue::Text`]. A load either
//! yields a complete [`Dataset`] or an [`Error::Dataset`]; partial data is never used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One present cell of a dataset row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Coerce a raw CSV cell; `None` means the cell is absent
    pub fn from_raw(input: &str) -> Option<Self> {
        let v = input.trim();
        if v.is_empty() {
            return None;
        }
        match v.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(CellValue::Number(n)),
            _ => Some(CellValue::Text(v.to_string())),
        }
    }

    /// Finite numeric reading of the cell, parsing text when possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Blank text counts as absent
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// Parameter name → value
pub type ParameterSet = BTreeMap<String, CellValue>;

/// One loaded dataset row; absent cells have no entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow {
    cells: BTreeMap<String, CellValue>,
}

impl DataRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures
    pub fn with(mut self, field: &str, value: impl Into<CellValue>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: CellValue) {
        self.cells.insert(field.to_string(), value);
    }

    /// Present (non-blank) value of a field
    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.cells.get(field).filter(|v| !v.is_blank())
    }

    pub fn is_present(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Finite numeric value of a field
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(CellValue::as_number)
    }

    /// Present values of the given fields
    pub fn project<'a, I>(&self, fields: I) -> ParameterSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        fields
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f.to_string(), v.clone())))
            .collect()
    }
}

impl FromIterator<(String, CellValue)> for DataRow {
    fn from_iter<T: IntoIterator<Item = (String, CellValue)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Value kind of a parameter column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Integer,
    Real,
    Category,
}

impl ParameterKind {
    /// Parse the metadata `parameter type` column
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(ParameterKind::Integer),
            "float" | "real" => Ok(ParameterKind::Real),
            "category" => Ok(ParameterKind::Category),
            other => Err(Error::Dataset(format!("unknown parameter type '{}'", other))),
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ParameterKind::Category)
    }
}

/// Inclusive numeric bounds with a discretization step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub low: f64,
    pub high: f64,
    pub step: f64,
}

impl NumericRange {
    /// Enforces `low <= high` and `step > 0`
    pub fn new(low: f64, high: f64, step: f64) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && step.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "range values must be finite (low={}, high={}, step={})",
                low, high, step
            )));
        }
        if low > high {
            return Err(Error::InvalidInput(format!("low {} exceeds high {}", low, high)));
        }
        if step <= 0.0 {
            return Err(Error::InvalidInput(format!("step {} must be positive", step)));
        }
        Ok(Self { low, high, step })
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.low).min(self.high)
    }

    /// Snap to the nearest multiple of `step` above `low`
    ///
    /// Not re-clamped: when `high - low` is not a multiple of `step`, a value
    /// near `high` can snap to the grid point past it.
    pub fn snap(&self, value: f64) -> f64 {
        ((value - self.low) / self.step).round() * self.step + self.low
    }
}

/// One parameter column of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: ParameterKind,
    pub unit: Option<String>,
    /// Present for numeric kinds only
    pub range: Option<NumericRange>,
}

impl ParameterDescriptor {
    pub fn numeric(name: &str, kind: ParameterKind, low: f64, high: f64, step: f64) -> Result<Self> {
        if !kind.is_numeric() {
            return Err(Error::InvalidInput(format!("{}: category parameters have no range", name)));
        }
        let range = NumericRange::new(low, high, step)
            .map_err(|e| Error::InvalidInput(format!("{}: {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
            kind,
            unit: None,
            range: Some(range),
        })
    }

    pub fn category(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Category,
            unit: None,
            range: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
}

/// One row of the metadata table after validation
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnMeta {
    Parameter(ParameterDescriptor),
    Score { name: String, unit: Option<String> },
}

/// A fully loaded dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// File prefix, e.g. `aeropress.`
    pub prefix: String,
    pub rows: Vec<DataRow>,
    pub parameters: Vec<ParameterDescriptor>,
    pub persons: Vec<String>,
}

impl Dataset {
    /// Assemble a dataset, rejecting duplicate or overlapping column names
    pub fn new(prefix: &str, rows: Vec<DataRow>, columns: Vec<ColumnMeta>) -> Result<Self> {
        let mut parameters = Vec::new();
        let mut persons = Vec::new();
        let mut seen = HashSet::new();

        for column in columns {
            let name = match &column {
                ColumnMeta::Parameter(p) => p.name.clone(),
                ColumnMeta::Score { name, .. } => name.clone(),
            };
            if !seen.insert(name.clone()) {
                return Err(Error::Dataset(format!("column '{}' described more than once", name)));
            }
            match column {
                ColumnMeta::Parameter(p) => parameters.push(p),
                ColumnMeta::Score { name, .. } => persons.push(name),
            }
        }

        Ok(Self {
            prefix: prefix.to_string(),
            rows,
            parameters,
            persons,
        })
    }

    /// Parse both tables from CSV text
    pub fn from_csv(prefix: &str, data_csv: &str, meta_csv: &str) -> Result<Self> {
        let rows = parse_csv(data_csv)?;
        let meta_rows = parse_csv(meta_csv)?;
        let columns = meta_rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_column_meta(row).map_err(|e| Error::Dataset(format!("metadata row {}: {}", i + 1, e))))
            .collect::<Result<Vec<_>>>()?;
        Self::new(prefix, rows, columns)
    }

    /// Load `<dir>/<prefix>data.csv` and `<dir>/<prefix>meta.csv`
    pub fn load(dir: &Path, prefix: &str) -> Result<Self> {
        let data_path = dir.join(format!("{}data.csv", prefix));
        let meta_path = dir.join(format!("{}meta.csv", prefix));
        debug!(data = %data_path.display(), meta = %meta_path.display(), "Loading dataset files");

        let data_csv = std::fs::read_to_string(&data_path)
            .map_err(|e| Error::Dataset(format!("could not load {}: {}", data_path.display(), e)))?;
        let meta_csv = std::fs::read_to_string(&meta_path)
            .map_err(|e| Error::Dataset(format!("could not load {}: {}", meta_path.display(), e)))?;

        let dataset = Self::from_csv(prefix, &data_csv, &meta_csv)?;
        info!(
            "Loaded dataset '{}': {} rows, {} parameters, {} persons",
            prefix,
            dataset.rows.len(),
            dataset.parameters.len(),
            dataset.persons.len()
        );
        Ok(dataset)
    }

    pub fn parameter_keys(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Split CSV text into rows keyed by the header
///
/// Blank lines are skipped. A line with more cells than the header is malformed.
pub fn parse_csv(text: &str) -> Result<Vec<DataRow>> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| Error::Dataset("CSV has no header row".to_string()))?;
    let headers: Vec<String> = header.split(',').map(|h| h.trim().to_string()).collect();

    if headers.iter().any(|h| h.is_empty()) {
        return Err(Error::Dataset("CSV header contains an empty column name".to_string()));
    }

    lines
        .enumerate()
        .map(|(i, line)| {
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() > headers.len() {
                return Err(Error::Dataset(format!(
                    "line {} has {} cells but the header has {}",
                    i + 2,
                    cols.len(),
                    headers.len()
                )));
            }
            Ok(headers
                .iter()
                .zip(cols.iter())
                .filter_map(|(h, raw)| CellValue::from_raw(raw).map(|v| (h.clone(), v)))
                .collect())
        })
        .collect()
}

fn parse_column_meta(row: &DataRow) -> Result<ColumnMeta> {
    let name = row
        .get("name")
        .map(|v| v.to_string())
        .ok_or_else(|| Error::Dataset("missing 'name'".to_string()))?;
    let unit = row.get("unit").map(|v| v.to_string());
    let column_type = row
        .get("type")
        .map(|v| v.to_string().to_ascii_lowercase())
        .ok_or_else(|| Error::Dataset(format!("{}: missing 'type'", name)))?;

    match column_type.as_str() {
        "score" => Ok(ColumnMeta::Score { name, unit }),
        "parameter" => {
            let kind = match row.get("parameter type") {
                Some(v) => ParameterKind::parse(&v.to_string())?,
                None => ParameterKind::Real,
            };
            let mut descriptor = if kind.is_numeric() {
                let low = required_number(row, "low", &name)?;
                let high = required_number(row, "high", &name)?;
                let step = row.number("step").unwrap_or(1.0);
                ParameterDescriptor::numeric(&name, kind, low, high, step)
                    .map_err(|e| Error::Dataset(e.to_string()))?
            } else {
                ParameterDescriptor::category(&name)
            };
            descriptor.unit = unit;
            Ok(ColumnMeta::Parameter(descriptor))
        }
        other => Err(Error::Dataset(format!("{}: unknown column type '{}'", name, other))),
    }
}

fn required_number(row: &DataRow, field: &str, name: &str) -> Result<f64> {
    row.number(field)
        .ok_or_else(|| Error::Dataset(format!("{}: numeric parameter needs '{}'", name, field)))
}
