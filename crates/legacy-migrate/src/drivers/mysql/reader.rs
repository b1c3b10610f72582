//! MySQL/MariaDB legacy reader.
//!
//! Implements [`LegacySource`] on top of an SQLx pool. Rows are decoded into
//! JSON values by their reported column type; values that fail to decode
//! (MySQL zero dates, for instance) are read as null.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use super::quote_ident;
use crate::config::ConnectionConfig;
use crate::core::record::parse_number;
use crate::core::schema::ColumnInfo;
use crate::core::traits::LegacySource;
use crate::core::Record;
use crate::error::{MigrateError, Result};
use crate::transform::format_canonical;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads run one at a time, so a small pool is enough.
const POOL_MAX_CONNECTIONS: u32 = 2;

/// MySQL/MariaDB legacy reader.
pub struct MysqlLegacyReader {
    pool: MySqlPool,
    database: String,
}

impl MysqlLegacyReader {
    /// Connect to the legacy database.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let ssl_mode = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                MySqlSslMode::Disabled
            }
            "require" => MySqlSslMode::Required,
            "verify-ca" | "verify_ca" => MySqlSslMode::VerifyCa,
            "verify-full" | "verify_identity" => MySqlSslMode::VerifyIdentity,
            _ => MySqlSslMode::Preferred,
        };

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode);

        let pool = MySqlPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection("legacy", e))?;

        info!("Connected to legacy database: {}", config.display_url());

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Convert a MySQL row to a record, keeping the select's column order.
    fn row_to_record(row: &MySqlRow) -> Record {
        row.columns()
            .iter()
            .map(|col| {
                let value = Self::column_value(row, col.ordinal(), col.type_info().name());
                (col.name().to_string(), value)
            })
            .collect()
    }

    /// Decode one column by its MySQL type name.
    fn column_value(row: &MySqlRow, i: usize, type_name: &str) -> Value {
        let is_null = row.try_get_raw(i).map(|r| r.is_null()).unwrap_or(true);
        if is_null {
            return Value::Null;
        }

        let type_name = type_name.to_uppercase();
        let unsigned = type_name.ends_with("UNSIGNED");
        let base = type_name.split_whitespace().next().unwrap_or("");

        let decoded = match base {
            "BOOLEAN" | "BOOL" => row.try_get::<bool, _>(i).ok().map(|b| Value::from(b as u8)),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" if unsigned => {
                row.try_get::<u64, _>(i).ok().map(Value::from)
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => {
                row.try_get::<i64, _>(i).ok().map(Value::from)
            }
            "YEAR" => row.try_get::<u16, _>(i).ok().map(Value::from),
            "FLOAT" => row.try_get::<f32, _>(i).ok().map(|f| Value::from(f as f64)),
            "DOUBLE" | "REAL" => row.try_get::<f64, _>(i).ok().map(Value::from),
            "DECIMAL" | "NUMERIC" => row
                .try_get::<rust_decimal::Decimal, _>(i)
                .ok()
                .map(decimal_value),
            "DATETIME" | "TIMESTAMP" => row
                .try_get::<chrono::NaiveDateTime, _>(i)
                .ok()
                .map(|dt| Value::String(format_canonical(dt))),
            "DATE" => row
                .try_get::<chrono::NaiveDate, _>(i)
                .ok()
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            "TIME" => row
                .try_get::<chrono::NaiveTime, _>(i)
                .ok()
                .map(|t| Value::String(t.format("%H:%M:%S").to_string())),
            _ => None,
        };

        decoded
            .or_else(|| row.try_get::<String, _>(i).ok().map(Value::String))
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(i)
                    .ok()
                    .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            })
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl LegacySource for MysqlLegacyReader {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::connection("legacy", e))?;
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        // CAST to CHAR to handle collation differences
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS field,
                CAST(COLUMN_TYPE AS CHAR(255)) AS column_type,
                CAST(IS_NULLABLE AS CHAR(3)) AS is_nullable,
                CAST(COLUMN_KEY AS CHAR(3)) AS column_key,
                CAST(COLUMN_DEFAULT AS CHAR(1024)) AS column_default,
                CAST(EXTRA AS CHAR(255)) AS extra
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(MigrateError::table(table, "table not found in legacy schema"));
        }

        let columns = rows
            .iter()
            .map(|row| ColumnInfo {
                field: row.get::<String, _>("field"),
                column_type: row.get::<String, _>("column_type"),
                null: row.get::<String, _>("is_nullable"),
                key: row.get::<String, _>("column_key"),
                default: row.get::<Option<String>, _>("column_default"),
                extra: row.get::<String, _>("extra"),
            })
            .collect();

        Ok(columns)
    }

    async fn read_chunk(
        &self,
        table: &str,
        order_by: &str,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} LIMIT ? OFFSET ?",
            quote_ident(table),
            quote_ident(order_by)
        );

        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .bind(limit as u64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!("{}: read {} rows at offset {}", table, rows.len(), offset);

        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

/// DECIMAL as a JSON number when the number prints back to the same text,
/// otherwise as the exact decimal text.
fn decimal_value(d: rust_decimal::Decimal) -> Value {
    let text = d.to_string();
    match parse_number(&text) {
        Some(n) if n.to_string() == text => Value::Number(n),
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_decimal_keeps_precision() {
        let value = |s: &str| decimal_value(Decimal::from_str(s).unwrap());
        assert_eq!(value("42"), json!(42));
        assert_eq!(value("51.5"), json!(51.5));
        assert_eq!(value("12345678901234567.89"), json!("12345678901234567.89"));
        assert_eq!(value("9007199254740993.5"), json!("9007199254740993.5"));
        assert_eq!(value("12.50"), json!("12.50"));
    }
}
