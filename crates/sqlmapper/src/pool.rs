//! `mysql_async` driver.
//!
//! [`MysqlDriver`] wraps one `mysql_async::Pool`. Statements run over the text
//! protocol; result columns are decoded into [`Value`]s using the column metadata.
//!
//! # Example
//!
//! ```ignore
//! let config = PoolConfig::from_url("mysql://app:pw@localhost/shop?connection_limit=5")?;
//! let router = Router::new(MysqlDriver::connect("write", &config)?);
//! ```

use crate::classify::has_multiple_statements;
use crate::client::{Driver, DriverAck, DriverResult, RowStream};
use crate::config::PoolConfig;
use crate::error::{OrmError, OrmResult};
use crate::value::{Record, Value};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::Queryable;
use mysql_async::{Column, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row};
use tokio::sync::mpsc;

/// Collation id of the `binary` character set.
const BINARY_CHARSET: u16 = 63;

/// Rows buffered between the streaming task and the consumer.
const STREAM_BUFFER: usize = 1;

/// A [`Driver`] over a `mysql_async` connection pool.
#[derive(Debug, Clone)]
pub struct MysqlDriver {
    name: String,
    pool: Pool,
    multiple_statements: bool,
}

impl MysqlDriver {
    /// Create a lazily connecting pool; no connection is opened until first use.
    pub fn connect(name: impl Into<String>, config: &PoolConfig) -> OrmResult<Self> {
        config.validate()?;
        if !config.hosts.is_empty() {
            return Err(OrmError::config(
                "MysqlDriver takes a single host; expand `hosts` into one driver per host",
            ));
        }

        let constraints = PoolConstraints::new(0, config.connection_limit).ok_or_else(|| {
            OrmError::config(format!(
                "invalid connection_limit {}",
                config.connection_limit
            ))
        })?;

        let mut init = Vec::new();
        if let Some(tz) = config.session_time_zone() {
            init.push(format!("SET time_zone = '{tz}'"));
        }

        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass((!config.password.is_empty()).then(|| config.password.clone()))
            .db_name(Some(config.database.clone()))
            .init(init)
            .pool_opts(PoolOpts::default().with_constraints(constraints));

        let name = name.into();
        tracing::info!(
            pool = %name,
            host = %config.host,
            port = config.port,
            database = %config.database,
            connection_limit = config.connection_limit,
            "mysql pool created"
        );
        Ok(Self {
            name,
            pool: Pool::new(opts),
            multiple_statements: config.multiple_statements,
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(name: impl Into<String>, pool: Pool) -> Self {
        Self {
            name: name.into(),
            pool,
            multiple_statements: false,
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The server always accepts stacked statements, so the check happens here.
    fn check_single_statement(&self, sql: &str) -> OrmResult<()> {
        if !self.multiple_statements && has_multiple_statements(sql) {
            return Err(OrmError::driver(
                "multiple statements in one query but multiple_statements is disabled",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        &self.name
    }

    /// Only the first result set is returned. With `multiple_statements` disabled,
    /// stacked statements are refused before anything is sent.
    async fn execute(&self, sql: &str) -> OrmResult<DriverResult> {
        self.check_single_statement(sql)?;
        let mut conn = self.pool.get_conn().await?;
        let mut result = conn.query_iter(sql).await?;

        let outcome = if result.columns_ref().is_empty() {
            let info = result.info();
            DriverResult::Ack(DriverAck {
                affected_rows: result.affected_rows(),
                insert_id: result.last_insert_id().unwrap_or(0),
                changed_rows: None,
                info: (!info.is_empty()).then(|| info.into_owned()),
            })
        } else {
            let rows: Vec<Row> = result.collect().await?;
            DriverResult::Rows(rows.into_iter().map(convert_row).collect())
        };

        result.drop_result().await?;
        Ok(outcome)
    }

    async fn open_stream(&self, sql: &str) -> OrmResult<RowStream> {
        self.check_single_statement(sql)?;
        let mut conn = self.pool.get_conn().await?;
        let (tx, rx) = mpsc::channel::<OrmResult<Record>>(STREAM_BUFFER);
        let sql = sql.to_string();
        let pool = self.name.clone();

        tokio::spawn(async move {
            let mut result = match conn.query_iter(sql).await {
                Ok(result) => result,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };
            loop {
                match result.next().await {
                    Ok(Some(row)) => {
                        if tx.send(Ok(convert_row(row))).await.is_err() {
                            tracing::debug!(pool = %pool, "stream consumer dropped");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        break;
                    }
                }
            }
        });

        Ok(RowStream::from_receiver(rx))
    }

    async fn shutdown(&self) -> OrmResult<()> {
        self.pool.clone().disconnect().await?;
        tracing::info!(pool = %self.name, "mysql pool disconnected");
        Ok(())
    }
}

fn convert_row(mut row: Row) -> Record {
    let columns = row.columns();
    let mut out = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let value = row
            .take::<mysql_async::Value, _>(idx)
            .unwrap_or(mysql_async::Value::NULL);
        out.push((column.name_str().into_owned(), convert_value(column, value)));
    }
    Record::from_columns(out)
}

fn convert_value(column: &Column, value: mysql_async::Value) -> Value {
    use mysql_async::Value as My;

    match value {
        My::NULL => Value::Null,
        My::Int(i) => Value::Int(i),
        My::UInt(u) => Value::UInt(u),
        My::Float(f) => Value::Float(f64::from(f)),
        My::Double(d) => Value::Float(d),
        My::Date(year, month, day, hour, minute, second, micros) => {
            match NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day)) {
                Some(date) if column.column_type() == ColumnType::MYSQL_TYPE_DATE => Value::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(u32::from(hour), u32::from(minute), u32::from(second), micros)
                    .map_or(Value::Null, Value::DateTime),
                None => Value::Null,
            }
        }
        My::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::Text(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"))
        }
        My::Bytes(bytes) => convert_text(column, bytes),
    }
}

/// Text-protocol values arrive as bytes; the column type decides how to read them.
fn convert_text(column: &Column, bytes: Vec<u8>) -> Value {
    if column.column_type() == ColumnType::MYSQL_TYPE_BIT
        || (column.character_set() == BINARY_CHARSET && is_string_type(column.column_type()))
    {
        return Value::Bytes(bytes);
    }

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };
    let unsigned = column.flags().contains(ColumnFlags::UNSIGNED_FLAG);

    let parsed = match column.column_type() {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => {
            if unsigned {
                text.parse().ok().map(Value::UInt)
            } else {
                text.parse().ok().map(Value::Int)
            }
        }
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
            text.parse().ok().map(Value::Float)
        }
        #[cfg(feature = "rust_decimal")]
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            text.parse().ok().map(Value::Decimal)
        }
        ColumnType::MYSQL_TYPE_DATE => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(Value::DateTime)
        }
        _ => None,
    };

    // Zero dates and out-of-range numbers stay as text.
    parsed.unwrap_or(Value::Text(text))
}

/// String and blob types; numeric and temporal columns also report the binary charset.
fn is_string_type(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_BLOB
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_GEOMETRY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on the discard port; the checks must fail before connecting.
    fn unreachable_driver(multiple_statements: bool) -> MysqlDriver {
        let config = PoolConfig::new("127.0.0.1", "app", "shop")
            .port(9)
            .multiple_statements(multiple_statements);
        MysqlDriver::connect("write", &config).unwrap()
    }

    #[tokio::test]
    async fn stacked_statements_are_refused_before_connecting() {
        let driver = unreachable_driver(false);

        let Err(err) = driver.execute("UPDATE t SET a = 1; DROP TABLE t").await else {
            panic!("stacked statements were executed");
        };
        assert!(matches!(&err, OrmError::Driver(msg) if msg.contains("multiple_statements")), "{err:?}");

        let Err(err) = driver.open_stream("SELECT 1; SELECT 2").await else {
            panic!("stacked statements were streamed");
        };
        assert!(matches!(&err, OrmError::Driver(msg) if msg.contains("multiple_statements")), "{err:?}");
    }

    #[tokio::test]
    async fn single_statement_check_honors_the_flag() {
        let strict = unreachable_driver(false);
        assert!(strict.check_single_statement("SELECT ';' FROM t;").is_ok());
        assert!(strict.check_single_statement("SELECT 1; SELECT 2").is_err());

        let lenient = unreachable_driver(true);
        assert!(lenient.check_single_statement("SELECT 1; SELECT 2").is_ok());
    }
}
