use serde::{Serialize, Serializer};

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for callers that report errors as data.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for the connection lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from adapter resolution, connect, or a driver handle.
   #[error(transparent)]
   Adapter(#[from] sqlx_conn_adapters::Error),

   /// An operation needed the driver handle before a successful connect.
   #[error("connection has no live driver handle")]
   NotConnected,

   /// No connection has been registered as the process default.
   #[error("no connection configured")]
   NoConnectionConfigured,

   /// No connection is installed under this alias.
   #[error("unknown connection alias: {0}")]
   UnknownAlias(String),

   /// The aliased connection has been dropped by its owner.
   #[error("connection for alias {0} has been dropped")]
   ConnectionDropped(String),

   /// A `before-*` event payload does not fit the operation's result type.
   #[error("payload of event {event} cannot be used as the query result: {source}")]
   InvalidEventPayload {
      event: String,
      #[source]
      source: serde_json::Error,
   },

   /// Multiple rows returned from fetch_one query.
   #[error("fetch_one() query returned {0} rows, expected 0 or 1")]
   MultipleRowsReturned(usize),
}

impl Error {
   /// True for failures detected before any driver I/O.
   pub fn is_configuration_error(&self) -> bool {
      matches!(self, Error::Adapter(e) if e.is_configuration_error())
   }

   /// True when the driver failed to establish or re-establish a session.
   pub fn is_connection_error(&self) -> bool {
      matches!(self, Error::Adapter(e) if e.is_connection_error())
   }

   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for callers that branch on
   /// the failure class rather than the message.
   pub fn error_code(&self) -> String {
      use sqlx_conn_adapters::Error as AdapterError;

      match self {
         Error::Adapter(AdapterError::Sqlx(e)) => {
            // Surface the backend's own error code where it reports one
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("DRIVER_{}", code);
            }
            "DRIVER_ERROR".to_string()
         }
         Error::Adapter(AdapterError::UnsupportedDatatype(_)) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Adapter(AdapterError::Io(_)) => "IO_ERROR".to_string(),
         Error::Adapter(e) if e.is_connection_error() => "CONNECTION_ERROR".to_string(),
         Error::Adapter(_) => "CONFIGURATION_ERROR".to_string(),
         Error::NotConnected => "NOT_CONNECTED".to_string(),
         Error::NoConnectionConfigured => "NO_CONNECTION_CONFIGURED".to_string(),
         Error::UnknownAlias(_) => "UNKNOWN_ALIAS".to_string(),
         Error::ConnectionDropped(_) => "CONNECTION_DROPPED".to_string(),
         Error::InvalidEventPayload { .. } => "INVALID_EVENT_PAYLOAD".to_string(),
         Error::MultipleRowsReturned(_) => "MULTIPLE_ROWS_RETURNED".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}
