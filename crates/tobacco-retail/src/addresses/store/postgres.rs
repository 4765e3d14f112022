use super::{
    quote_identifier, AddressStore, BoundValue, ColumnKind, InsertPlan, StoreError, TableColumn,
};
use crate::addresses::dataset::AddressDataset;
use crate::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::str::FromStr;
use tracing::debug;

// Protocol limit is 65535 parameters per statement.
const MAX_BINDS: usize = 65_535;

#[derive(Debug, Clone)]
pub struct PgAddressStore {
    pool: PgPool,
    table: String,
}

impl PgAddressStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub(super) fn connect_lazy(config: &DatabaseConfig, table: &str) -> Result<Self, StoreError> {
        let options = match config.url.as_deref() {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => {
                let options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.username)
                    .database(&config.database);
                match config.password.as_deref() {
                    Some(password) => options.password(password),
                    None => options,
                }
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self::new(pool, table))
    }
}

/// Classifies a column from its `pg_type.typname`; `sql_type` is the
/// `format_type` rendering used as the cast target.
fn pg_column(name: String, type_name: &str, sql_type: String) -> TableColumn {
    let kind = match type_name {
        "int2" | "int4" | "int8" => ColumnKind::Integer,
        "float4" | "float8" | "numeric" => ColumnKind::Real,
        _ => ColumnKind::Text,
    };
    let assignable_from_text = matches!(type_name, "text" | "varchar" | "bpchar" | "name");
    let cast = (kind == ColumnKind::Text && !assignable_from_text).then_some(sql_type);

    TableColumn { name, kind, cast }
}

fn insert_statement<'args>(
    plan: &InsertPlan,
    chunk: &'args [Vec<BoundValue>],
) -> QueryBuilder<'args, Postgres> {
    let targets = plan.targets();
    let mut builder = QueryBuilder::<Postgres>::new(plan.prefix());
    builder.push_values(chunk, |mut row, values| {
        for (value, target) in values.iter().zip(targets) {
            match (value, target.cast.as_deref()) {
                (BoundValue::Text(text), Some(sql_type)) => {
                    row.push("CAST(")
                        .push_bind_unseparated(text.clone())
                        .push_unseparated(format!(" AS {sql_type})"));
                }
                (BoundValue::Text(text), None) => {
                    row.push_bind(text.clone());
                }
                (BoundValue::Integer(number), _) => {
                    row.push_bind(*number);
                }
                (BoundValue::Real(number), _) => {
                    row.push_bind(*number);
                }
            }
        }
    });
    builder
}

impl AddressStore for PgAddressStore {
    async fn row_count(&self) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn columns(&self) -> Result<Vec<TableColumn>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT a.attname::text, t.typname::text, format_type(a.atttypid, a.atttypmod) \
             FROM pg_attribute a \
             JOIN pg_type t ON t.oid = a.atttypid \
             WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
        )
        .bind(quote_identifier(&self.table))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, type_name, sql_type)| pg_column(name, &type_name, sql_type))
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
            let mut builder = insert_statement(&plan, chunk);
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
    use std::io::Cursor;

    fn address_columns() -> Vec<TableColumn> {
        vec![
            pg_column("landlot_address".into(), "varchar", "character varying(200)".into()),
            pg_column("road_name_address".into(), "text", "text".into()),
            pg_column("x".into(), "float8", "double precision".into()),
            pg_column("y".into(), "float8", "double precision".into()),
            pg_column("opened_on".into(), "date", "date".into()),
            pg_column("location".into(), "point", "point".into()),
            pg_column("floors".into(), "int4", "integer".into()),
        ]
    }

    fn dataset(csv: &str) -> AddressDataset {
        AddressDataset::from_reader(Cursor::new(csv.to_string())).expect("dataset parses")
    }

    #[test]
    fn classifies_by_exact_type_name() {
        let point = pg_column("location".into(), "point", "point".into());
        assert_eq!(point.kind, ColumnKind::Text);
        assert_eq!(point.cast.as_deref(), Some("point"));

        let interval = pg_column("open_for".into(), "interval", "interval".into());
        assert_eq!(interval.kind, ColumnKind::Text);

        let date = pg_column("opened_on".into(), "date", "date".into());
        assert_eq!(date.cast.as_deref(), Some("date"));

        let count = pg_column("floors".into(), "int8", "bigint".into());
        assert_eq!(count.kind, ColumnKind::Integer);
        assert_eq!(count.cast, None);

        let x = pg_column("x".into(), "numeric", "numeric(10,6)".into());
        assert_eq!(x.kind, ColumnKind::Real);

        let name = pg_column("road".into(), "varchar", "character varying(200)".into());
        assert_eq!(name.kind, ColumnKind::Text);
        assert_eq!(name.cast, None);
    }

    #[test]
    fn point_values_are_accepted_as_text() {
        let dataset = dataset(
            "landlot_address,road_name_address,location\nA,B,\"(126.9,37.5)\"\n",
        );
        let plan = InsertPlan::build("address", &address_columns(), &dataset).expect("plan");
        let rows: Vec<_> = plan.chunks(MAX_BINDS).flatten().collect();
        assert_eq!(rows[0][2], BoundValue::Text(Some("(126.9,37.5)".to_string())));
    }

    #[test]
    fn text_bound_to_typed_columns_is_cast() {
        let dataset = dataset(
            "landlot_address,road_name_address,x,y,opened_on,location,floors\n\
             A,B,126.9,37.5,2024-01-31,\"(126.9,37.5)\",3\n\
             C,D,,,,,\n",
        );
        let plan = InsertPlan::build("address", &address_columns(), &dataset).expect("plan");
        let chunk = plan.chunks(MAX_BINDS).next().expect("one chunk");

        let builder = insert_statement(&plan, chunk);

        assert_eq!(
            builder.sql(),
            "INSERT INTO \"address\" (\"landlot_address\", \"road_name_address\", \"x\", \"y\", \"opened_on\", \"location\", \"floors\") \
             VALUES ($1, $2, $3, $4, CAST($5 AS date), CAST($6 AS point), $7), \
             ($8, $9, $10, $11, CAST($12 AS date), CAST($13 AS point), $14)"
        );
    }

    #[tokio::test]
    async fn discrete_settings_build_a_lazy_pool() {
        let config = DatabaseConfig {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "postgres".to_string(),
            password: Some("secret".to_string()),
            database: "tobacco_retail".to_string(),
            max_connections: 1,
            acquire_timeout: std::time::Duration::from_millis(200),
        };

        let store = PgAddressStore::connect_lazy(&config, "address").expect("lazy pool");
        assert_eq!(store.pool.size(), 0);
    }
}
