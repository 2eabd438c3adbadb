//! MySQL live backend
//!
//! Hands the pool raw, unpooled `mysql_async` connections so that every
//! pooling decision (capacity, deadlines, retirement) is made by
//! [`crate::pool::Pool`], not by the driver.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Row as MySqlRow, TxOpts};
use tracing::debug;

use super::types::{from_mysql_value, to_mysql_value};
use super::Connection;
use crate::config::DbConfig;
use crate::error::Result;
use crate::mapper::RawRow;
use crate::pool::ConnectionManager;
use crate::value::Value;

/// Establishes MySQL connections for the pool.
pub struct MySqlManager {
    opts: Opts,
}

impl MySqlManager {
    /// Build a manager from the dashboard configuration.
    pub fn from_config(config: &DbConfig) -> Result<Self> {
        let (host, port, database) = config.dsn_parts()?;
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()));
        if let Some(database) = database {
            builder = builder.db_name(Some(database));
        }
        Ok(Self {
            opts: Opts::from(builder),
        })
    }

    /// Build a manager from explicit driver options.
    pub fn with_opts(opts: Opts) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl ConnectionManager for MySqlManager {
    type Conn = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection> {
        let inner = Conn::new(self.opts.clone()).await?;
        Ok(MySqlConnection { inner })
    }

    async fn close(&self, conn: MySqlConnection) {
        if let Err(e) = conn.inner.disconnect().await {
            debug!(error = %e, "error during connection disconnect");
        }
    }
}

/// A single MySQL connection, exclusively owned by one lease at a time.
pub struct MySqlConnection {
    inner: Conn,
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(to_mysql_value).collect())
    }
}

fn decode_row(row: MySqlRow) -> Result<RawRow> {
    let columns = row.columns_ref();
    let mut decoded = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let name = column.name_str().to_string();
        let value = match row.as_ref(i) {
            Some(v) => from_mysql_value(v.clone())?,
            None => Value::Null,
        };
        decoded.push((name, value));
    }
    Ok(decoded)
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RawRow>> {
        let rows: Vec<MySqlRow> = self.inner.exec(sql, to_params(params)).await?;
        let mut decoded = Vec::with_capacity(rows.len());
        for row in rows {
            decoded.push(decode_row(row)?);
        }
        Ok(decoded)
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut tx = self.inner.start_transaction(TxOpts::default()).await?;
        match tx.exec_drop(sql, to_params(params)).await {
            Ok(()) => {
                let affected = tx.affected_rows();
                tx.commit().await?;
                Ok(affected)
            }
            Err(e) => {
                // Roll back explicitly; drop would also roll back, but then
                // the commit/rollback outcome would be invisible to us.
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.inner.ping().await?;
        Ok(())
    }
}
