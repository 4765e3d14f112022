use super::{quote_identifier, AddressStore, BoundValue, InsertPlan, StoreError, TableColumn};
use crate::addresses::dataset::AddressDataset;
use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::debug;

// SQLITE_MAX_VARIABLE_NUMBER on builds older than 3.32.
const MAX_BINDS: usize = 999;

#[derive(Debug, Clone)]
pub struct SqliteAddressStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteAddressStore {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub(super) fn connect_lazy(config: &DatabaseConfig, table: &str) -> Result<Self, StoreError> {
        let url = config.url.as_deref().unwrap_or("sqlite::memory:");
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self::new(pool, table))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl AddressStore for SqliteAddressStore {
    async fn row_count(&self) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn columns(&self) -> Result<Vec<TableColumn>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
                .bind(&self.table)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(name, declared)| TableColumn::new(name, &declared))
            .collect())
    }

    async fn append(&self, dataset: &AddressDataset) -> Result<u64, StoreError> {
        let columns = self.columns().await?;
        let plan = InsertPlan::build(&self.table, &columns, dataset)?;
        if plan.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in plan.chunks(MAX_BINDS) {
            let mut builder = QueryBuilder::<Sqlite>::new(plan.prefix());
            builder.push_values(chunk, |mut row, values| {
                for value in values {
                    match value {
                        BoundValue::Text(text) => row.push_bind(text.clone()),
                        BoundValue::Integer(number) => row.push_bind(*number),
                        BoundValue::Real(number) => row.push_bind(*number),
                    };
                }
            });
            let result = builder.build().execute(&mut *tx).await?;
            debug!(rows = chunk.len(), table = %self.table, "inserted address batch");
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::store::ColumnKind;
    use std::io::Cursor;

    async fn memory_store() -> SqliteAddressStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::query(
            "CREATE TABLE address (
                landlot_address TEXT NOT NULL,
                road_name_address TEXT NOT NULL,
                x DOUBLE PRECISION NOT NULL,
                y DOUBLE PRECISION NOT NULL,
                households INTEGER
            )",
        )
        .execute(&pool)
        .await
        .expect("create table");
        SqliteAddressStore::new(pool, "address")
    }

    #[tokio::test]
    async fn reads_declared_columns_in_order() {
        let store = memory_store().await;
        let columns = store.columns().await.expect("columns");
        let names: Vec<_> = columns.iter().map(|column| column.name.as_str()).collect();
        assert_eq!(
            names,
            ["landlot_address", "road_name_address", "x", "y", "households"]
        );
        assert_eq!(columns[2].kind, ColumnKind::Real);
        assert_eq!(columns[4].kind, ColumnKind::Integer);
    }

    #[tokio::test]
    async fn append_inserts_across_multiple_statements() {
        let store = memory_store().await;
        let mut csv = String::from("landlot_address,road_name_address,x,y,households\n");
        for index in 0..450 {
            csv.push_str(&format!("lot {index},road {index},{index}.5,37.5,{index}\n"));
        }
        let dataset = AddressDataset::from_reader(Cursor::new(csv)).expect("dataset");

        let inserted = store.append(&dataset).await.expect("append");
        assert_eq!(inserted, 450);
        assert_eq!(store.row_count().await.expect("count"), 450);

        let total: i64 = sqlx::query_scalar("SELECT SUM(households) FROM address")
            .fetch_one(store.pool())
            .await
            .expect("sum");
        assert_eq!(total, (0..450).sum::<i64>());
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_earlier_batches() {
        let store = memory_store().await;
        let mut csv = String::from("landlot_address,road_name_address,x,y,households\n");
        for index in 0..400 {
            csv.push_str(&format!("lot {index},road {index},1,2,\n"));
        }
        let dataset = AddressDataset::from_reader(Cursor::new(csv)).expect("dataset");
        sqlx::query("CREATE UNIQUE INDEX address_lot ON address (landlot_address)")
            .execute(store.pool())
            .await
            .expect("index");
        sqlx::query("INSERT INTO address VALUES ('lot 399', 'seed', 0, 0, NULL)")
            .execute(store.pool())
            .await
            .expect("seed row");

        let error = store.append(&dataset).await.expect_err("unique violation");
        assert!(matches!(error, StoreError::Database(_)));
        assert_eq!(store.row_count().await.expect("count"), 1);
    }
}
