use super::normalizer::{address_or_sentinel, clean_header, coordinate_or_sentinel, present};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

pub const LANDLOT_ADDRESS: &str = "landlot_address";
pub const ROAD_NAME_ADDRESS: &str = "road_name_address";
pub const X: &str = "x";
pub const Y: &str = "y";

/// A value headed for the store before it is coerced to a column type.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
}

/// One normalized row of the address file.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub landlot_address: String,
    pub road_name_address: String,
    /// `None` unless the file carries both `x` and `y`.
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Every other column, untouched apart from blank cells becoming `Null`.
    pub passthrough: BTreeMap<String, CellValue>,
}

impl AddressRecord {
    pub fn value(&self, column: &str) -> CellValue {
        match column {
            LANDLOT_ADDRESS => CellValue::Text(self.landlot_address.clone()),
            ROAD_NAME_ADDRESS => CellValue::Text(self.road_name_address.clone()),
            X => self.coordinate_or_passthrough(self.x, X),
            Y => self.coordinate_or_passthrough(self.y, Y),
            other => self.passthrough_value(other),
        }
    }

    fn coordinate_or_passthrough(&self, coordinate: Option<f64>, column: &str) -> CellValue {
        match coordinate {
            Some(value) => CellValue::Number(value),
            None => self.passthrough_value(column),
        }
    }

    fn passthrough_value(&self, column: &str) -> CellValue {
        self.passthrough
            .get(column)
            .cloned()
            .unwrap_or(CellValue::Null)
    }
}

/// The whole address file, normalized and ready to append.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressDataset {
    columns: Vec<String>,
    has_coordinates: bool,
    records: Vec<AddressRecord>,
}

impl AddressDataset {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(clean_header).collect();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.clone()));
            }
        }

        let position = |name: &'static str| columns.iter().position(|column| column == name);
        let landlot =
            position(LANDLOT_ADDRESS).ok_or(DatasetError::MissingColumn(LANDLOT_ADDRESS))?;
        let road_name =
            position(ROAD_NAME_ADDRESS).ok_or(DatasetError::MissingColumn(ROAD_NAME_ADDRESS))?;
        let coordinates = position(X).zip(position(Y));

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let line = row.position().map(|pos| pos.line()).unwrap_or_default();
            if row.len() > columns.len() {
                return Err(DatasetError::RaggedRow {
                    line,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            let (x, y) = match coordinates {
                Some((x_index, y_index)) => (
                    Some(parse_coordinate(&row, x_index, X, line)?),
                    Some(parse_coordinate(&row, y_index, Y, line)?),
                ),
                None => (None, None),
            };

            let passthrough = columns
                .iter()
                .enumerate()
                .filter(|(index, _)| {
                    *index != landlot
                        && *index != road_name
                        && coordinates.map_or(true, |(xi, yi)| *index != xi && *index != yi)
                })
                .map(|(index, column)| {
                    let value = present(row.get(index))
                        .map(|raw| CellValue::Text(raw.to_string()))
                        .unwrap_or(CellValue::Null);
                    (column.clone(), value)
                })
                .collect();

            records.push(AddressRecord {
                landlot_address: address_or_sentinel(row.get(landlot)),
                road_name_address: address_or_sentinel(row.get(road_name)),
                x,
                y,
                passthrough,
            });
        }

        Ok(Self {
            columns,
            has_coordinates: coordinates.is_some(),
            records,
        })
    }

    /// Column names in file order; this is the column list of the insert.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_coordinates(&self) -> bool {
        self.has_coordinates
    }

    pub fn records(&self) -> &[AddressRecord] {
        &self.records
    }
}

fn parse_coordinate(
    row: &csv::StringRecord,
    index: usize,
    column: &'static str,
    line: u64,
) -> Result<f64, DatasetError> {
    let raw = row.get(index);
    coordinate_or_sentinel(raw).ok_or_else(|| DatasetError::InvalidCoordinate {
        line,
        column,
        value: raw.unwrap_or_default().to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read address file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid address CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("address file is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("address file declares column `{0}` more than once")]
    DuplicateColumn(String),
    #[error("line {line}: expected at most {expected} fields, found {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: `{column}` value '{value}' is not a number")]
    InvalidCoordinate {
        line: u64,
        column: &'static str,
        value: String,
    },
}
