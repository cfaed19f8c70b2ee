//! Query builder bound to a connection

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx_conn_adapters::{JsonRow, WriteQueryResult};
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::error::{Error, Result};

/// Classify a statement by its leading keyword.
///
/// Returns `select`, `insert`, `update` or `delete`, and `query` for anything
/// else (DDL, `WITH`, `PRAGMA`, ...). Used to name the events a builder fires.
///
/// ```
/// use sqlx_conn_lifecycle::statement_kind;
///
/// assert_eq!(statement_kind("  select * from users"), "select");
/// assert_eq!(statement_kind("INSERT INTO users VALUES (1)"), "insert");
/// assert_eq!(statement_kind("CREATE TABLE t (id INTEGER)"), "query");
/// ```
pub fn statement_kind(sql: &str) -> &'static str {
   let keyword: String = sql
      .trim_start()
      .chars()
      .take_while(|c| c.is_ascii_alphabetic())
      .collect::<String>()
      .to_ascii_lowercase();

   match keyword.as_str() {
      "select" => "select",
      "insert" => "insert",
      "update" => "update",
      "delete" => "delete",
      _ => "query",
   }
}

/// Builder handed out by [`Connection::query_builder`].
///
/// Holds a reference to the connection, never a copy of its driver handle:
/// every operation applies the idle-timeout policy and then locks whatever
/// handle the connection holds at that moment, so reconnects are visible to
/// builders created before them.
///
/// Each operation fires `before-<kind>` and `after-<kind>` through the
/// connection's [`EventHandler`](crate::EventHandler), for the builder's table
/// and for [`ANY_TABLE`](crate::ANY_TABLE). A `before-*` callback that returns
/// a payload short-circuits the operation: the payload is decoded as the
/// result and neither the statement nor `after-*` runs.
#[derive(Clone)]
pub struct QueryBuilderHandler {
   connection: Arc<Connection>,
   table: Option<String>,
}

impl QueryBuilderHandler {
   pub(crate) fn new(connection: Arc<Connection>) -> Self {
      Self {
         connection,
         table: None,
      }
   }

   pub fn connection(&self) -> &Arc<Connection> {
      &self.connection
   }

   /// A new builder for the same connection, bound to `table`
   pub fn table(&self, name: impl Into<String>) -> Self {
      Self {
         connection: Arc::clone(&self.connection),
         table: Some(name.into()),
      }
   }

   pub fn table_name(&self) -> Option<&str> {
      self.table.as_deref()
   }

   /// Identity of the connection's live handle
   pub async fn handle_id(&self) -> Option<u64> {
      self.connection.handle_id().await
   }

   /// Execute a write statement
   pub async fn execute(&self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let kind = statement_kind(sql);
      if let Some(result) = self.before(kind).await? {
         return Ok(result);
      }

      let result = {
         let mut handle = self.connection.driver_handle().await?;
         handle.execute(sql, values).await?
      };
      self.after(kind);
      Ok(result)
   }

   /// Run a query and return all rows
   pub async fn fetch_all(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      let kind = statement_kind(sql);
      if let Some(rows) = self.before(kind).await? {
         return Ok(rows);
      }

      let rows = {
         let mut handle = self.connection.driver_handle().await?;
         handle.fetch_all(sql, values).await?
      };
      self.after(kind);
      Ok(rows)
   }

   /// Run a query expected to return zero or one row.
   ///
   /// A `before-*` payload is read as a list of rows, as for
   /// [`fetch_all`](Self::fetch_all), and the row-count rule applies to it.
   pub async fn fetch_one(&self, sql: &str, values: Vec<JsonValue>) -> Result<Option<JsonRow>> {
      let mut rows = self.fetch_all(sql, values).await?;
      match rows.len() {
         0 => Ok(None),
         1 => Ok(rows.pop()),
         count => Err(Error::MultipleRowsReturned(count)),
      }
   }

   /// Apply the idle policy, then fire `before-<kind>`.
   ///
   /// A payload from a callback replaces the query: it is decoded as the
   /// operation's result and the statement is never sent.
   async fn before<T: DeserializeOwned>(&self, kind: &str) -> Result<Option<T>> {
      self.connection.maybe_reconnect().await?;

      let event = format!("before-{kind}");
      let Some(payload) = self.fire(&event) else {
         return Ok(None);
      };

      debug!(event = %event, table = ?self.table, "Event payload replaces query");
      serde_json::from_value(payload)
         .map(Some)
         .map_err(|source| Error::InvalidEventPayload { event, source })
   }

   /// Fire `after-<kind>` once the statement has run
   fn after(&self, kind: &str) {
      // After events observe the result; a payload cannot change it
      if self.fire(&format!("after-{kind}")).is_some() {
         trace!(kind, table = ?self.table, "Ignoring after-event payload");
      }
   }

   fn fire(&self, event: &str) -> Option<JsonValue> {
      trace!(event, table = ?self.table, "Dispatching builder event");
      self
         .connection
         .event_handler()
         .fire(event, self.table.as_deref(), self)
   }
}

impl fmt::Debug for QueryBuilderHandler {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("QueryBuilderHandler")
         .field("adapter", &self.connection.adapter())
         .field("table", &self.table)
         .finish()
   }
}
