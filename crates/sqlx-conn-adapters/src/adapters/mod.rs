//! Driver adapters, one per supported database family

use async_trait::async_trait;

use crate::Result;
use crate::config::AdapterConfig;
use crate::handle::DriverHandle;
use crate::kind::AdapterKind;

mod mysql;
mod pgsql;
mod sqlite;

pub use mysql::MysqlAdapter;
pub use pgsql::PgsqlAdapter;
pub use sqlite::{MEMORY_DATABASE, SqliteAdapter};

/// Turns a configuration mapping into a live driver handle.
///
/// Implementations validate the configuration before any I/O, so a malformed
/// configuration fails with [`Error::InvalidConfig`](crate::Error::InvalidConfig)
/// and a session that cannot be established fails with
/// [`Error::Connect`](crate::Error::Connect). Neither is retried here.
#[async_trait]
pub trait Adapter: Send + Sync + std::fmt::Debug {
   /// The database family this adapter connects to
   fn kind(&self) -> AdapterKind;

   /// Open a new session
   async fn connect(&self, config: &AdapterConfig) -> Result<DriverHandle>;
}

/// Constructs adapter instances for a resolved [`AdapterKind`].
pub trait AdapterFactory: Send + Sync + std::fmt::Debug {
   fn build(&self, kind: AdapterKind) -> Box<dyn Adapter>;
}

/// Factory for the adapters shipped with this crate.
///
/// ```
/// use sqlx_conn_adapters::{AdapterFactory, AdapterKind, NativeAdapterFactory};
///
/// let adapter = NativeAdapterFactory.build(AdapterKind::Sqlite);
/// assert_eq!(adapter.kind(), AdapterKind::Sqlite);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAdapterFactory;

impl AdapterFactory for NativeAdapterFactory {
   fn build(&self, kind: AdapterKind) -> Box<dyn Adapter> {
      match kind {
         AdapterKind::Mysql => Box::new(MysqlAdapter),
         AdapterKind::Pgsql => Box::new(PgsqlAdapter),
         AdapterKind::Sqlite => Box::new(SqliteAdapter),
      }
   }
}
