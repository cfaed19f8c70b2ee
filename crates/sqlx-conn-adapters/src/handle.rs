//! Live driver handle owned by exactly one connection

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::query::Query;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection as _, Database, Encode, MySql, Postgres, Sqlite, Type};

use crate::Result;
use crate::decode::{JsonRow, decode_mysql_row, decode_pg_row, decode_sqlite_row};
use crate::kind::AdapterKind;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID, where the backend reports one.
   ///
   /// SQLite reports its ROWID and MySQL its AUTO_INCREMENT value. PostgreSQL
   /// has no equivalent (use `RETURNING` instead) and always yields `None`.
   pub last_insert_id: Option<i64>,
}

/// The native sqlx connection behind a [`DriverHandle`].
pub enum DriverConnection {
   MySql(MySqlConnection),
   Postgres(PgConnection),
   Sqlite(SqliteConnection),
}

impl DriverConnection {
   fn kind(&self) -> AdapterKind {
      match self {
         DriverConnection::MySql(_) => AdapterKind::Mysql,
         DriverConnection::Postgres(_) => AdapterKind::Pgsql,
         DriverConnection::Sqlite(_) => AdapterKind::Sqlite,
      }
   }
}

/// A single open database session.
///
/// Every operation returns a `Result`: driver failures always surface as
/// [`Error::Sqlx`](crate::Error::Sqlx) and are never swallowed into sentinel
/// values. Each handle carries a process-unique [`id`](Self::id) that changes
/// whenever a connection is re-established.
pub struct DriverHandle {
   id: u64,
   conn: DriverConnection,
}

impl DriverHandle {
   /// Wrap a native connection, assigning it a fresh identity
   pub fn new(conn: DriverConnection) -> Self {
      Self {
         id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
         conn,
      }
   }

   /// Process-unique identity of this session
   pub fn id(&self) -> u64 {
      self.id
   }

   pub fn kind(&self) -> AdapterKind {
      self.conn.kind()
   }

   /// Direct access to the native connection for sqlx queries not covered by
   /// the JSON helpers
   pub fn connection_mut(&mut self) -> &mut DriverConnection {
      &mut self.conn
   }

   /// Execute a write statement, binding JSON values positionally
   pub async fn execute(&mut self, sql: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let result = match &mut self.conn {
         DriverConnection::MySql(conn) => {
            let done = bind_values(sqlx::query::<MySql>(sql), values).execute(&mut *conn).await?;
            WriteQueryResult {
               rows_affected: done.rows_affected(),
               last_insert_id: i64::try_from(done.last_insert_id()).ok().filter(|id| *id != 0),
            }
         }
         DriverConnection::Postgres(conn) => {
            let done = bind_values(sqlx::query::<Postgres>(sql), values).execute(&mut *conn).await?;
            WriteQueryResult {
               rows_affected: done.rows_affected(),
               last_insert_id: None,
            }
         }
         DriverConnection::Sqlite(conn) => {
            let done = bind_values(sqlx::query::<Sqlite>(sql), values).execute(&mut *conn).await?;
            WriteQueryResult {
               rows_affected: done.rows_affected(),
               last_insert_id: Some(done.last_insert_rowid()),
            }
         }
      };

      Ok(result)
   }

   /// Run a query and decode every returned row to JSON
   pub async fn fetch_all(&mut self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<JsonRow>> {
      match &mut self.conn {
         DriverConnection::MySql(conn) => {
            let rows = bind_values(sqlx::query::<MySql>(sql), values).fetch_all(&mut *conn).await?;
            rows.iter().map(decode_mysql_row).collect()
         }
         DriverConnection::Postgres(conn) => {
            let rows = bind_values(sqlx::query::<Postgres>(sql), values).fetch_all(&mut *conn).await?;
            rows.iter().map(decode_pg_row).collect()
         }
         DriverConnection::Sqlite(conn) => {
            let rows = bind_values(sqlx::query::<Sqlite>(sql), values).fetch_all(&mut *conn).await?;
            rows.iter().map(decode_sqlite_row).collect()
         }
      }
   }

   /// Check that the session is still alive
   pub async fn ping(&mut self) -> Result<()> {
      match &mut self.conn {
         DriverConnection::MySql(conn) => conn.ping().await?,
         DriverConnection::Postgres(conn) => conn.ping().await?,
         DriverConnection::Sqlite(conn) => conn.ping().await?,
      }
      Ok(())
   }

   /// Close the session gracefully, releasing its server-side resources
   pub async fn close(self) -> Result<()> {
      match self.conn {
         DriverConnection::MySql(conn) => conn.close().await?,
         DriverConnection::Postgres(conn) => conn.close().await?,
         DriverConnection::Sqlite(conn) => conn.close().await?,
      }
      Ok(())
   }
}

impl fmt::Debug for DriverHandle {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("DriverHandle")
         .field("id", &self.id)
         .field("kind", &self.kind())
         .finish_non_exhaustive()
   }
}

type BoundQuery<'q, DB> = Query<'q, DB, <DB as Database>::Arguments<'q>>;

fn bind_values<'q, DB>(mut query: BoundQuery<'q, DB>, values: Vec<JsonValue>) -> BoundQuery<'q, DB>
where
   DB: Database,
   Option<String>: Encode<'q, DB> + Type<DB>,
   String: Encode<'q, DB> + Type<DB>,
   i64: Encode<'q, DB> + Type<DB>,
   f64: Encode<'q, DB> + Type<DB>,
   bool: Encode<'q, DB> + Type<DB>,
{
   for value in values {
      query = bind_value(query, value);
   }
   query
}

/// Bind a JSON value to a query.
///
/// Integers keep their precision as `i64`; `u64` values above `i64::MAX`
/// fall back to `f64`. Arrays and objects are bound as their JSON text.
pub fn bind_value<'q, DB>(query: BoundQuery<'q, DB>, value: JsonValue) -> BoundQuery<'q, DB>
where
   DB: Database,
   Option<String>: Encode<'q, DB> + Type<DB>,
   String: Encode<'q, DB> + Type<DB>,
   i64: Encode<'q, DB> + Type<DB>,
   f64: Encode<'q, DB> + Type<DB>,
   bool: Encode<'q, DB> + Type<DB>,
{
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Number(number) => {
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other.to_string()),
   }
}
