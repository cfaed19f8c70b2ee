use std::str::FromStr;

use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tracing::debug;

use super::Adapter;
use crate::Result;
use crate::config::AdapterConfig;
use crate::error::Error;
use crate::handle::{DriverConnection, DriverHandle};
use crate::kind::AdapterKind;

const KIND: AdapterKind = AdapterKind::Pgsql;

/// PostgreSQL adapter.
///
/// Reads `database` (required), `host`, `port`, `username`, `password`,
/// `charset` (sent as `client_encoding`), `schema` (sent as `search_path`),
/// and the driver options `ssl_mode`, `application_name` and
/// `statement_cache_capacity`. Unset keys fall back to the libpq environment
/// (`PGHOST`, `PGPORT`, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct PgsqlAdapter;

impl PgsqlAdapter {
   /// Build connect options from the configuration without touching the network
   pub fn connect_options(&self, config: &AdapterConfig) -> Result<PgConnectOptions> {
      let database = config.required_string(KIND, "database")?;
      let mut options = PgConnectOptions::new().database(&database);

      if let Some(host) = config.string(KIND, "host")? {
         options = options.host(&host);
      }
      if let Some(port) = config.port(KIND)? {
         options = options.port(port);
      }
      if let Some(username) = config.string(KIND, "username")? {
         options = options.username(&username);
      }
      if let Some(password) = config.string(KIND, "password")? {
         options = options.password(&password);
      }

      let mut session = Vec::new();
      if let Some(charset) = config.string(KIND, "charset")? {
         session.push(("client_encoding", charset));
      }
      if let Some(schema) = config.string(KIND, "schema")? {
         session.push(("search_path", schema));
      }
      if !session.is_empty() {
         options = options.options(session);
      }

      let driver_options = config.options(KIND)?;
      if let Some(mode) = driver_options.string(KIND, "ssl_mode")? {
         let mode = PgSslMode::from_str(&mode)
            .map_err(|e| Error::invalid_config(KIND, format!("invalid ssl_mode: {e}")))?;
         options = options.ssl_mode(mode);
      }
      if let Some(name) = driver_options.string(KIND, "application_name")? {
         options = options.application_name(&name);
      }
      if let Some(capacity) = driver_options.unsigned(KIND, "statement_cache_capacity")? {
         options = options.statement_cache_capacity(capacity as usize);
      }

      Ok(options)
   }
}

#[async_trait]
impl Adapter for PgsqlAdapter {
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

      Ok(DriverHandle::new(DriverConnection::Postgres(conn)))
   }
}
