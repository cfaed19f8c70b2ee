//! # sqlx-conn-adapters
//!
//! Driver adapters that turn an opaque configuration map into a live SQLx
//! connection. One adapter exists per supported database family.
//!
//! ## Core Types
//!
//! - **[`AdapterKind`]**: Closed set of supported adapters, parsed case-insensitively from a selector
//! - **[`AdapterConfig`]**: Opaque, insertion-ordered configuration map
//! - **[`Adapter`]**: Capability to open a session from a configuration
//! - **[`AdapterFactory`]**: Builds adapter instances; [`NativeAdapterFactory`] ships MySQL, PostgreSQL and SQLite
//! - **[`DriverHandle`]**: One exclusively owned native session with a process-unique identity
//! - **[`Error`]**: Configuration, connection and driver errors
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_conn_adapters::{AdapterConfig, AdapterFactory, AdapterKind, NativeAdapterFactory};
//!
//! #[tokio::main]
//! async fn main() -> sqlx_conn_adapters::Result<()> {
//!     let kind: AdapterKind = "sqlite".parse()?;
//!     let config = AdapterConfig::new().with("database", ":memory:");
//!
//!     let mut handle = NativeAdapterFactory.build(kind).connect(&config).await?;
//!     handle.execute("CREATE TABLE users (name TEXT)", vec![]).await?;
//!
//!     let rows = handle.fetch_all("SELECT * FROM users", vec![]).await?;
//!     assert!(rows.is_empty());
//!
//!     handle.close().await?;
//!     Ok(())
//! }
//! ```
//!
mod adapters;
mod config;
mod decode;
mod error;
mod handle;
mod kind;

pub use adapters::{
   Adapter, AdapterFactory, MEMORY_DATABASE, MysqlAdapter, NativeAdapterFactory, PgsqlAdapter,
   SqliteAdapter,
};
pub use config::{AdapterConfig, OPTIONS_KEY, RECONNECT_TIMEOUT_KEY};
pub use decode::{JsonRow, mysql_to_json, pg_to_json, sqlite_to_json};
pub use error::Error;
pub use handle::{DriverConnection, DriverHandle, WriteQueryResult, bind_value};
pub use kind::AdapterKind;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
