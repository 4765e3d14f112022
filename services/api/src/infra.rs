use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tobacco_retail::addresses::{AddressTableInitializer, InitOutcome, SqlAddressStore};
use tobacco_retail::config::{AddressSourceConfig, DatabaseConfig};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Label of the startup address load: `loaded`, `skipped` or `failed`.
    pub(crate) address_table: &'static str,
}

/// Startup hook shared by `serve` and `load-addresses`. Never fails; a store
/// that cannot even be configured is reported as a failed outcome.
pub(crate) async fn initialize_addresses(
    database: &DatabaseConfig,
    source: &AddressSourceConfig,
) -> InitOutcome {
    let store = match SqlAddressStore::connect_lazy(database, &source.table) {
        Ok(store) => store,
        Err(error) => {
            warn!(%error, "address store could not be configured");
            return InitOutcome::Failed(error.into());
        }
    };

    info!(
        backend = store.backend(),
        table = %source.table,
        source = %source.csv_path.display(),
        "initializing address table"
    );
    AddressTableInitializer::from_config(store, source)
        .run()
        .await
}
