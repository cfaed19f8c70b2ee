use std::str::FromStr;

use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use tracing::debug;

use super::Adapter;
use crate::Result;
use crate::config::AdapterConfig;
use crate::error::Error;
use crate::handle::{DriverConnection, DriverHandle};
use crate::kind::AdapterKind;

const KIND: AdapterKind = AdapterKind::Mysql;

/// MySQL / MariaDB adapter.
///
/// Reads `database` (required), `host`, `port`, `unix_socket`, `username`,
/// `password`, `charset`, `collation`, and the driver options `ssl_mode`,
/// `timezone` and `statement_cache_capacity`. A `unix_socket` takes precedence
/// over `host`/`port`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlAdapter;

impl MysqlAdapter {
   /// Build connect options from the configuration without touching the network
   pub fn connect_options(&self, config: &AdapterConfig) -> Result<MySqlConnectOptions> {
      let database = config.required_string(KIND, "database")?;
      let mut options = MySqlConnectOptions::new().database(&database);

      if let Some(socket) = config.string(KIND, "unix_socket")? {
         options = options.socket(socket);
      } else {
         let host = config
            .string(KIND, "host")?
            .unwrap_or_else(|| "localhost".to_string());
         options = options.host(&host);
         if let Some(port) = config.port(KIND)? {
            options = options.port(port);
         }
      }

      if let Some(username) = config.string(KIND, "username")? {
         options = options.username(&username);
      }
      if let Some(password) = config.string(KIND, "password")? {
         options = options.password(&password);
      }
      if let Some(charset) = config.string(KIND, "charset")? {
         options = options.charset(&charset);
      }
      if let Some(collation) = config.string(KIND, "collation")? {
         options = options.collation(&collation);
      }

      let driver_options = config.options(KIND)?;
      if let Some(mode) = driver_options.string(KIND, "ssl_mode")? {
         let mode = MySqlSslMode::from_str(&mode)
            .map_err(|e| Error::invalid_config(KIND, format!("invalid ssl_mode: {e}")))?;
         options = options.ssl_mode(mode);
      }
      if let Some(timezone) = driver_options.string(KIND, "timezone")? {
         options = options.timezone(Some(timezone));
      }
      if let Some(capacity) = driver_options.unsigned(KIND, "statement_cache_capacity")? {
         options = options.statement_cache_capacity(capacity as usize);
      }

      Ok(options)
   }
}

#[async_trait]
impl Adapter for MysqlAdapter {
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

      Ok(DriverHandle::new(DriverConnection::MySql(conn)))
   }
}
