// PostgreSQL executor backed by the per-dataset connection pools
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tokio_postgres::types::Type;
use tokio_postgres::Row;

use crate::models::{DatasetId, ResultSet};
use crate::services::database::adapter::{QueryError, QueryExecutor};
use crate::services::ConnectionPoolManager;

pub struct PostgresExecutor {
    pools: Arc<ConnectionPoolManager>,
    timeout: Duration,
}

impl PostgresExecutor {
    pub fn new(pools: Arc<ConnectionPoolManager>, timeout_secs: u64) -> Self {
        Self {
            pools,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn row_values(row: &Row) -> Vec<Value> {
        row.columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| Self::column_value(row, idx, column.type_()))
            .collect()
    }

    fn column_value(row: &Row, idx: usize, ty: &Type) -> Value {
        let value = match *ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| json!(v)),
            Type::INT2 => row.try_get::<_, Option<i16>>(idx).map(|v| json!(v)),
            Type::INT4 => row.try_get::<_, Option<i32>>(idx).map(|v| json!(v)),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| json!(v)),
            Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).map(|v| json!(v)),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| json!(v)),
            // Exact decimal text; NaN and infinities fail and fall through to the placeholder
            Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx).map(|v| json!(v)),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| json!(v.map(|t| t.to_string()))),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| json!(v.map(|t| t.to_rfc3339()))),
            Type::DATE => row
                .try_get::<_, Option<NaiveDate>>(idx)
                .map(|v| json!(v.map(|d| d.to_string()))),
            Type::JSON | Type::JSONB => row
                .try_get::<_, Option<Value>>(idx)
                .map(|v| v.unwrap_or(Value::Null)),
            _ => row.try_get::<_, Option<String>>(idx).map(|v| json!(v)),
        };

        // Types with no text conversion show up as a placeholder
        value.unwrap_or_else(|_| json!(format!("<{}>", ty.name())))
    }

    fn driver_message(err: &tokio_postgres::Error) -> String {
        match err.as_db_error() {
            Some(db_error) => db_error.message().to_string(),
            None => err.to_string(),
        }
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, dataset: DatasetId, sql: &str) -> Result<ResultSet, QueryError> {
        let pool = self
            .pools
            .pool(dataset)
            .map_err(|e| QueryError::new(sql, e.to_string()))?;

        let start_time = Instant::now();
        // Checkout and query share one deadline so an unreachable host cannot stall the turn
        let rows = tokio::time::timeout(self.timeout, async {
            // Returned to the pool when dropped at the end of this block
            let client = pool
                .get()
                .await
                .map_err(|e| QueryError::new(sql, format!("Failed to get connection from pool: {}", e)))?;
            client
                .query(sql, &[])
                .await
                .map_err(|e| QueryError::new(sql, Self::driver_message(&e)))
        })
        .await
        .map_err(|_| QueryError::new(sql, format!("Query timeout after {} seconds", self.timeout.as_secs())))??;

        let result = ResultSet::new(rows.iter().map(Self::row_values).collect());
        tracing::info!(
            "Query on {} returned {} rows in {} ms",
            dataset,
            result.row_count(),
            start_time.elapsed().as_millis()
        );
        Ok(result)
    }
}
