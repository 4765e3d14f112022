//! Address dataset ingestion: reading the source CSV, normalizing missing
//! fields, and loading it once into the `address` table.

mod dataset;
mod normalizer;
pub mod store;

pub use dataset::{
    AddressDataset, AddressRecord, CellValue, DatasetError, LANDLOT_ADDRESS, ROAD_NAME_ADDRESS,
    X, Y,
};
pub use normalizer::{EMPTY_ADDRESS, MISSING_COORDINATE};
pub use store::{
    AddressStore, ColumnKind, PgAddressStore, SqlAddressStore, SqliteAddressStore, StoreError,
    TableColumn,
};

use crate::config::AddressSourceConfig;
use std::path::PathBuf;
use tracing::{info, warn};

/// What a single initializer run did.
#[derive(Debug)]
pub enum InitOutcome {
    Loaded { rows: u64 },
    Skipped { existing_rows: i64 },
    Failed(InitError),
}

impl InitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            InitOutcome::Loaded { .. } => "loaded",
            InitOutcome::Skipped { .. } => "skipped",
            InitOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, InitOutcome::Failed(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] DatasetError),
}

/// Populates the address table from the source file when, and only when,
/// the table is empty.
pub struct AddressTableInitializer<S> {
    store: S,
    source: PathBuf,
}

impl<S: AddressStore> AddressTableInitializer<S> {
    pub fn new(store: S, source: impl Into<PathBuf>) -> Self {
        Self {
            store,
            source: source.into(),
        }
    }

    pub fn from_config(store: S, config: &AddressSourceConfig) -> Self {
        Self::new(store, config.csv_path.clone())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Never fails: errors come back as [`InitOutcome::Failed`] after being logged.
    pub async fn run(&self) -> InitOutcome {
        match self.try_run().await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    %error,
                    source = %self.source.display(),
                    "address table initialization failed"
                );
                InitOutcome::Failed(error)
            }
        }
    }

    async fn try_run(&self) -> Result<InitOutcome, InitError> {
        info!("checking address table state");
        let existing_rows = self.store.row_count().await?;
        if existing_rows > 0 {
            info!(
                existing_rows,
                "address table already populated, skipping initialization"
            );
            return Ok(InitOutcome::Skipped { existing_rows });
        }

        info!(source = %self.source.display(), "address table is empty, loading CSV data");
        let dataset = AddressDataset::from_path(&self.source)?;
        let rows = self.store.append(&dataset).await?;
        info!(rows, "address CSV data inserted");

        Ok(InitOutcome::Loaded { rows })
    }
}
