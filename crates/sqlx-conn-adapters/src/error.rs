//! Error types for sqlx-conn-adapters

use thiserror::Error;

use crate::kind::AdapterKind;

/// Errors that may occur while resolving an adapter, opening a driver
/// connection, or using a driver handle
#[derive(Error, Debug)]
pub enum Error {
   /// The adapter selector does not name a supported database family
   #[error("Unknown database adapter '{0}': expected one of mysql, pgsql, sqlite")]
   UnknownAdapter(String),

   /// The adapter configuration is structurally invalid (missing or
   /// wrong-typed key). Detected before any driver I/O.
   #[error("Invalid {adapter} adapter configuration: {message}")]
   InvalidConfig {
      adapter: AdapterKind,
      message: String,
   },

   /// A configuration document could not be parsed
   #[error("Invalid configuration document: {0}")]
   InvalidConfigDocument(#[from] serde_json::Error),

   /// The driver could not establish a session
   #[error("Failed to connect to {adapter} database: {source}")]
   Connect {
      adapter: AdapterKind,
      #[source]
      source: sqlx::Error,
   },

   /// Error raised by the driver while using an established handle
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Column type that cannot be mapped to JSON
   #[error("Unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// IO error when reading configuration files
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   pub(crate) fn invalid_config(adapter: AdapterKind, message: impl Into<String>) -> Self {
      Error::InvalidConfig {
         adapter,
         message: message.into(),
      }
   }

   /// True for failures detected before any driver I/O: an unresolvable
   /// selector or a malformed configuration.
   pub fn is_configuration_error(&self) -> bool {
      matches!(
         self,
         Error::UnknownAdapter(_) | Error::InvalidConfig { .. } | Error::InvalidConfigDocument(_)
      )
   }

   /// True when the driver failed to establish a session.
   pub fn is_connection_error(&self) -> bool {
      matches!(self, Error::Connect { .. })
   }
}
