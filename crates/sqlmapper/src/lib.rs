//! # sqlmapper
//!
//! A MySQL data-access layer: structured filters and write arguments in, escaped SQL
//! text out, routed to a primary (write) pool or to replica (read) pools.
//!
//! ## Features
//!
//! - **Query builder**: SELECT / COUNT / INSERT / UPSERT / UPDATE / DELETE from filter
//!   objects with a per-column operator grammar (`gt`, `gte`, `lt`, `lte`, `eq`, `ne`,
//!   `like`, `in`, `nin`, `raw`)
//! - **Literal escaping**: every value is rendered as an escaped SQL literal
//! - **Name normalization**: `firstName` becomes `first_name`; JSON paths
//!   (`meta->>'$.key'`) are kept verbatim
//! - **Read/write routing**: statement kind is checked before dispatch
//! - **Streaming**: pull-based row streams with per-row mapping
//! - **Safe defaults**: DELETE and UPDATE require a filter, UPDATE requires SET
//!
//! ## Example
//!
//! ```ignore
//! use sqlmapper::{Dao, Filter, QueryOptions, Router, RouterConfig, record};
//! use std::sync::Arc;
//!
//! let router = Arc::new(Router::connect(&RouterConfig::from_env()?)?);
//! let users = Dao::raw(router, "users")?;
//!
//! users.create(&record! { "firstName" => "John", "lastName" => "Doe" }).await?;
//!
//! let does = users
//!     .get_all(
//!         Filter::new().eq("lastName", "Doe").gt("age", 18),
//!         &QueryOptions::new().sort_desc("email").limit(10),
//!     )
//!     .await?;
//! ```

pub mod builder;
pub mod classify;
pub mod client;
pub mod condition;
pub mod config;
pub mod dao;
pub mod error;
pub mod ident;
pub mod mock;
pub mod normalize;
pub mod router;
pub mod sanitize;
pub mod stream;
pub mod value;

#[cfg(feature = "mysql")]
pub mod pool;

pub use builder::{InsertMode, OnDuplicate, QueryBuilder, QueryOptions, SortDirection};
pub use classify::{Classification, StatementKind, classify};
pub use client::{Driver, DriverAck, DriverResult, RowStream};
pub use condition::{Condition, Filter, IntoFilter, Op};
pub use config::{PoolConfig, RouterConfig};
pub use dao::{AllAndCount, Dao, Entity, FromRecord};
pub use error::{OrmError, OrmResult};
pub use ident::{Column, Ident, IntoIdent};
pub use mock::{MockDriver, MockResponse};
pub use normalize::ModificationResult;
pub use router::{ReadBalance, Router, RouterBuilder, RouterOptions};
pub use stream::RecordStream;
pub use value::{FromValue, Json, Record, ToRecord, Value};

#[cfg(feature = "mysql")]
pub use pool::MysqlDriver;

#[cfg(feature = "derive")]
pub use sqlmapper_derive::{Entity, FromRecord, ToRecord};
