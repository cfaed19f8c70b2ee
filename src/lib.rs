//! # sqlx-conn-lifecycle
//!
//! Connection lifecycle management beneath a query builder: adapter selection,
//! connect and reconnect, idle-timeout reconnection, and a process default
//! connection that convenience layers can find without being handed one.
//!
//! ## Core Types
//!
//! - **[`Connection`]**: Owns the selector, configuration, live driver handle and event handler
//! - **[`ConnectionRegistry`]**: Write-once slot naming the first connection that connected
//! - **[`EventHandler`]**: Per-connection callbacks keyed by event and table
//! - **[`QueryBuilderHandler`]**: Builder bound to a connection, reading the live handle on every call
//! - **[`AliasFacade`]**: Named access to connections and the registry default
//!
//! Driver adapters, configuration and handles come from [`sqlx_conn_adapters`]
//! and are re-exported here.
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_conn_lifecycle::{AdapterConfig, AliasFacade, Connection, ConnectionOptions};
//!
//! #[tokio::main]
//! async fn main() -> sqlx_conn_lifecycle::Result<()> {
//!     let config = AdapterConfig::new()
//!         .with("database", "app.db")
//!         .with("reconnect_timeout", 60);
//!
//!     let conn =
//!         Connection::with_options("sqlite", config, ConnectionOptions::new().with_alias("DB"))
//!             .await?;
//!
//!     let users = AliasFacade::global().table("DB", "users")?;
//!     users.execute("CREATE TABLE IF NOT EXISTS users (name TEXT)", vec![]).await?;
//!
//!     let rows = conn.query_builder().fetch_all("SELECT * FROM users", vec![]).await?;
//!     println!("{} users", rows.len());
//!     Ok(())
//! }
//! ```
//!
mod builder;
mod connection;
mod error;
mod events;
mod facade;
mod registry;

pub use builder::{QueryBuilderHandler, statement_kind};
pub use connection::{Connection, ConnectionOptions, ConnectionSettings};
pub use error::{Error, Result};
pub use events::{ANY_TABLE, EventCallback, EventHandler};
pub use facade::AliasFacade;
pub use registry::ConnectionRegistry;

pub use sqlx_conn_adapters::{
   Adapter, AdapterConfig, AdapterFactory, AdapterKind, DriverConnection, DriverHandle, JsonRow,
   NativeAdapterFactory, RECONNECT_TIMEOUT_KEY, WriteQueryResult,
};
