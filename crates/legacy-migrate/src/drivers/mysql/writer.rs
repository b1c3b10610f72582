//! MySQL/MariaDB target writer.
//!
//! Implements [`TargetStore`] with a single mysql_async session. Foreign-key
//! checking is a session variable, so every statement must go through the
//! same connection; the session sits behind a `tokio::sync::Mutex`.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, SslOpts, TxOpts};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::quote_ident;
use crate::config::ConnectionConfig;
use crate::core::traits::TargetStore;
use crate::core::Record;
use crate::error::{MigrateError, Result};

/// MySQL max placeholders per statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// MySQL target writer holding one session.
pub struct MysqlTargetWriter {
    conn: Mutex<Conn>,
}

impl MysqlTargetWriter {
    /// Open the target session.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => Some(SslOpts::default()),
            _ => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let conn = Conn::new(builder)
            .await
            .map_err(|e| MigrateError::connection("target", e))?;

        info!("Connected to target database: {}", config.display_url());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Column list shared by every record of a batch; missing values are NULL.
    fn batch_columns(records: &[Record]) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for record in records {
            for column in record.keys() {
                if !columns.contains(&column.as_str()) {
                    columns.push(column.as_str());
                }
            }
        }
        columns
    }
}

#[async_trait]
impl TargetStore for MysqlTargetWriter {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("target", e))?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let sql = r#"
            SELECT COUNT(*) FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        "#;

        let mut conn = self.conn.lock().await;
        let count: Option<i64> = conn.exec_first(sql, (table,)).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn record_exists(&self, table: &str, key_column: &str, key: &Value) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
            quote_ident(table),
            quote_ident(key_column)
        );

        let mut conn = self.conn.lock().await;
        let found: Option<i64> = conn.exec_first(&sql, (json_to_mysql(key),)).await?;
        Ok(found.is_some())
    }

    async fn insert_record(&self, table: &str, record: &Record) -> Result<()> {
        let columns: Vec<String> = record.keys().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let params: Vec<mysql_async::Value> = record.values().map(json_to_mysql).collect();

        let mut conn = self.conn.lock().await;
        conn.exec_drop(&sql, params).await?;
        Ok(())
    }

    async fn insert_batch(&self, table: &str, records: &[Record]) -> Result<u64> {
        let columns = Self::batch_columns(records);
        if records.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let col_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let max_rows = (MYSQL_MAX_PLACEHOLDERS / columns.len()).max(1);

        let mut conn = self.conn.lock().await;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;

        // Sub-batches share one transaction so the batch stays all-or-nothing
        for chunk in records.chunks(max_rows) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                quote_ident(table),
                col_list.join(", "),
                vec![row_placeholders.as_str(); chunk.len()].join(", ")
            );
            let params: Vec<mysql_async::Value> = chunk
                .iter()
                .flat_map(|record| {
                    columns.iter().map(move |c| {
                        record
                            .get(*c)
                            .map(json_to_mysql)
                            .unwrap_or(mysql_async::Value::NULL)
                    })
                })
                .collect();
            tx.exec_drop(&sql, params).await?;
        }

        tx.commit().await?;

        debug!("MySQL: inserted {} rows into {}", records.len(), table);
        Ok(records.len() as u64)
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        let sql = if enabled {
            "SET FOREIGN_KEY_CHECKS = 1"
        } else {
            "SET FOREIGN_KEY_CHECKS = 0"
        };
        let mut conn = self.conn.lock().await;
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let mut conn = self.conn.lock().await;
        let count: Option<u64> = conn.query_first(&sql).await?;
        Ok(count.unwrap_or(0))
    }
}

/// Convert a JSON value to a MySQL parameter.
fn json_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mysql_async::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                mysql_async::Value::from(u)
            } else {
                mysql_async::Value::from(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => mysql_async::Value::from(s.as_str()),
        other => mysql_async::Value::from(other.to_string()),
    }
}
