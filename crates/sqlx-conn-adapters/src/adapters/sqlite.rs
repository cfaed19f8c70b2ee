use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::debug;

use super::Adapter;
use crate::Result;
use crate::config::AdapterConfig;
use crate::error::Error;
use crate::handle::{DriverConnection, DriverHandle};
use crate::kind::AdapterKind;

const KIND: AdapterKind = AdapterKind::Sqlite;

/// Path that selects a private in-memory database
pub const MEMORY_DATABASE: &str = ":memory:";

/// SQLite adapter.
///
/// Reads `database` (required; a file path or `:memory:`) and the driver
/// options `create_if_missing` (default `true`), `read_only`, `foreign_keys`
/// and `busy_timeout` (seconds). Every `:memory:` connection opens a new,
/// independent database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteAdapter;

impl SqliteAdapter {
   /// Build connect options from the configuration without touching the disk
   pub fn connect_options(&self, config: &AdapterConfig) -> Result<SqliteConnectOptions> {
      let database = config.required_string(KIND, "database")?;

      let mut options = if database == MEMORY_DATABASE {
         SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::invalid_config(KIND, e.to_string()))?
      } else {
         SqliteConnectOptions::new().filename(&database)
      };

      let driver_options = config.options(KIND)?;
      options = options.create_if_missing(
         driver_options
            .bool_flag(KIND, "create_if_missing")?
            .unwrap_or(true),
      );
      if let Some(read_only) = driver_options.bool_flag(KIND, "read_only")? {
         options = options.read_only(read_only);
      }
      if let Some(foreign_keys) = driver_options.bool_flag(KIND, "foreign_keys")? {
         options = options.foreign_keys(foreign_keys);
      }
      if let Some(seconds) = driver_options.unsigned(KIND, "busy_timeout")? {
         options = options.busy_timeout(Duration::from_secs(seconds));
      }

      Ok(options)
   }
}

#[async_trait]
impl Adapter for SqliteAdapter {
   fn kind(&self) -> AdapterKind {
      KIND
   }

   async fn connect(&self, config: &AdapterConfig) -> Result<DriverHandle> {
      let options = self.connect_options(config)?;
      debug!(adapter = %KIND, "Opening driver connection");

      let conn = options.connect().await.map_err(|source| Error::Connect {
         adapter: KIND,
         source,
      })?;

      Ok(DriverHandle::new(DriverConnection::Sqlite(conn)))
   }
}
