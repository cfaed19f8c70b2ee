//! Adapter selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The closed set of supported database families.
///
/// Selectors are case-insensitive, so `"MySQL"`, `"mysql"` and `"MYSQL"` all
/// resolve to [`AdapterKind::Mysql`].
///
/// ```
/// use sqlx_conn_adapters::AdapterKind;
///
/// let kind: AdapterKind = "PgSQL".parse().unwrap();
/// assert_eq!(kind, AdapterKind::Pgsql);
/// assert_eq!(kind.canonical_name(), "Pgsql");
/// assert!("oracle".parse::<AdapterKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
   Mysql,
   Pgsql,
   Sqlite,
}

impl AdapterKind {
   /// All supported adapters, in registration order
   pub const ALL: [AdapterKind; 3] = [AdapterKind::Mysql, AdapterKind::Pgsql, AdapterKind::Sqlite];

   /// Normalized type name: lowercased with the first letter capitalized
   pub fn canonical_name(&self) -> &'static str {
      match self {
         AdapterKind::Mysql => "Mysql",
         AdapterKind::Pgsql => "Pgsql",
         AdapterKind::Sqlite => "Sqlite",
      }
   }

   /// Lowercase selector key
   pub fn as_str(&self) -> &'static str {
      match self {
         AdapterKind::Mysql => "mysql",
         AdapterKind::Pgsql => "pgsql",
         AdapterKind::Sqlite => "sqlite",
      }
   }
}

impl fmt::Display for AdapterKind {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

impl FromStr for AdapterKind {
   type Err = Error;

   fn from_str(selector: &str) -> Result<Self, Self::Err> {
      let normalized = selector.to_lowercase();
      AdapterKind::ALL
         .into_iter()
         .find(|kind| kind.as_str() == normalized)
         .ok_or_else(|| Error::UnknownAdapter(selector.to_string()))
   }
}
