mod postgres;
mod sqlite;

pub use postgres::PgAddressStore;
pub use sqlite::SqliteAddressStore;

use super::dataset::{AddressDataset, CellValue};
use crate::config::DatabaseConfig;
use std::future::Future;

/// Storage abstraction for the address table so the initializer can run
/// against any backend.
pub trait AddressStore: Send + Sync {
    fn row_count(&self) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Ordered columns of the target table; empty when the table is absent.
    fn columns(&self) -> impl Future<Output = Result<Vec<TableColumn>, StoreError>> + Send;

    /// Appends every record in one transaction and returns the inserted row count.
    fn append(
        &self,
        dataset: &AddressDataset,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("table `{0}` does not exist or has no columns")]
    MissingTable(String),
    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },
    #[error("value '{value}' in column `{column}` cannot be stored as {kind}")]
    Coercion {
        column: String,
        value: String,
        kind: ColumnKind,
    },
}

/// Storage class a CSV value is coerced to before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
}

impl ColumnKind {
    /// Classifies a declared SQLite column type by its affinity rules.
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if ["REAL", "FLOA", "DOUB", "NUM", "DEC"]
            .iter()
            .any(|marker| upper.contains(marker))
        {
            Self::Real
        } else {
            Self::Text
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "real",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// SQL type that bound text is cast to on insert, for columns the
    /// backend will not assign from a text parameter.
    pub cast: Option<String>,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, declared_type: &str) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::from_declared_type(declared_type),
            cast: None,
        }
    }
}

/// A cell coerced to its column's kind, ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoundValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Real(Option<f64>),
}

impl BoundValue {
    fn coerce(value: CellValue, kind: ColumnKind, column: &str) -> Result<Self, StoreError> {
        let mismatch = |raw: String| StoreError::Coercion {
            column: column.to_string(),
            value: raw,
            kind,
        };

        match (value, kind) {
            (CellValue::Null, ColumnKind::Text) => Ok(Self::Text(None)),
            (CellValue::Null, ColumnKind::Integer) => Ok(Self::Integer(None)),
            (CellValue::Null, ColumnKind::Real) => Ok(Self::Real(None)),
            (CellValue::Text(raw), ColumnKind::Text) => Ok(Self::Text(Some(raw))),
            (CellValue::Text(raw), ColumnKind::Integer) => match parse_integer(raw.trim()) {
                Some(number) => Ok(Self::Integer(Some(number))),
                None => Err(mismatch(raw)),
            },
            (CellValue::Text(raw), ColumnKind::Real) => match raw.trim().parse::<f64>() {
                Ok(number) => Ok(Self::Real(Some(number))),
                Err(_) => Err(mismatch(raw)),
            },
            (CellValue::Number(number), ColumnKind::Text) => {
                Ok(Self::Text(Some(number.to_string())))
            }
            (CellValue::Number(number), ColumnKind::Integer) => match integral(number) {
                Some(whole) => Ok(Self::Integer(Some(whole))),
                None => Err(mismatch(number.to_string())),
            },
            (CellValue::Number(number), ColumnKind::Real) => Ok(Self::Real(Some(number))),
        }
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(integral))
}

fn integral(number: f64) -> Option<i64> {
    let in_range = number >= i64::MIN as f64 && number <= i64::MAX as f64;
    (number.is_finite() && number.fract() == 0.0 && in_range).then_some(number as i64)
}

/// Validated, fully coerced insert for one dataset.
#[derive(Debug)]
pub(crate) struct InsertPlan {
    prefix: String,
    targets: Vec<TableColumn>,
    rows: Vec<Vec<BoundValue>>,
}

impl InsertPlan {
    pub(crate) fn build(
        table: &str,
        table_columns: &[TableColumn],
        dataset: &AddressDataset,
    ) -> Result<Self, StoreError> {
        if table_columns.is_empty() {
            return Err(StoreError::MissingTable(table.to_string()));
        }

        let targets = dataset
            .columns()
            .iter()
            .map(|name| {
                table_columns
                    .iter()
                    .find(|column| &column.name == name)
                    .cloned()
                    .ok_or_else(|| StoreError::UnknownColumn {
                        table: table.to_string(),
                        column: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = dataset
            .records()
            .iter()
            .map(|record| {
                dataset
                    .columns()
                    .iter()
                    .zip(&targets)
                    .map(|(name, target)| BoundValue::coerce(record.value(name), target.kind, name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let column_list = dataset
            .columns()
            .iter()
            .map(|name| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Self {
            prefix: format!(
                "INSERT INTO {} ({}) ",
                quote_identifier(table),
                column_list
            ),
            targets,
            rows,
        })
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Table columns matching the dataset columns, in insert order.
    pub(crate) fn targets(&self) -> &[TableColumn] {
        &self.targets
    }

    /// Row batches whose bind count stays within `max_binds`.
    pub(crate) fn chunks(&self, max_binds: usize) -> std::slice::Chunks<'_, Vec<BoundValue>> {
        let per_statement = (max_binds / self.targets.len().max(1)).max(1);
        self.rows.chunks(per_statement)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Backend chosen from [`DatabaseConfig`]; dispatches to the concrete store.
#[derive(Debug, Clone)]
pub enum SqlAddressStore {
    Postgres(PgAddressStore),
    Sqlite(SqliteAddressStore),
}

impl SqlAddressStore {
    /// Builds a lazily connecting pool, so an unreachable database is reported
    /// by the first query instead of here.
    pub fn connect_lazy(config: &DatabaseConfig, table: &str) -> Result<Self, StoreError> {
        if config.is_sqlite() {
            SqliteAddressStore::connect_lazy(config, table).map(Self::Sqlite)
        } else {
            PgAddressStore::connect_lazy(config, table).map(Self::Postgres)
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            SqlAddressStore::Postgres(_) => "postgres",
            SqlAddressStore::Sqlite(_) => "sqlite",
        }
    }
}

impl AddressStore for SqlAddressStore {
    async fn row_count(&self) -> Result<i64, StoreError> {
        match self {
            SqlAddressStore::Postgres(store) => store.row_count().await,
            SqlAddressStore::Sqlite(store) => store.row_count().await,
        }
    }

    async fn columns(&self) -> Result<Vec<TableColumn>, StoreError> {
        match self {
            SqlAddressStore::Postgres(store) => store.columns().await,
            SqlAddressStore::Sqlite(store) => store.columns().await,
        }
    }

    async fn append(&self, dataset: &AddressDataset) -> Result<u64, StoreError> {
        match self {
            SqlAddressStore::Postgres(store) => store.append(dataset).await,
            SqlAddressStore::Sqlite(store) => store.append(dataset).await,
        }
    }
}
