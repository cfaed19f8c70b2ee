//! Named access to connections without passing them around

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::builder::QueryBuilderHandler;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::registry::ConnectionRegistry;

static GLOBAL_FACADE: LazyLock<Arc<AliasFacade>> = LazyLock::new(|| Arc::new(AliasFacade::new()));

/// Alias table mapping names to connections, plus access to the default
/// connection of a [`ConnectionRegistry`].
///
/// Aliases hold weak references: the facade never keeps a connection alive,
/// and an alias whose connection was dropped is removed on its next lookup.
/// Each lookup hands out a fresh [`QueryBuilderHandler`].
#[derive(Debug)]
pub struct AliasFacade {
   aliases: RwLock<HashMap<String, Weak<Connection>>>,
   registry: Arc<ConnectionRegistry>,
}

impl Default for AliasFacade {
   fn default() -> Self {
      Self::with_registry(ConnectionRegistry::global())
   }
}

impl AliasFacade {
   /// A facade whose default builder reads the process-global registry
   pub fn new() -> Self {
      Self::default()
   }

   /// A facade whose default builder reads `registry`
   pub fn with_registry(registry: Arc<ConnectionRegistry>) -> Self {
      Self {
         aliases: RwLock::new(HashMap::new()),
         registry,
      }
   }

   /// The process-wide facade
   pub fn global() -> Arc<AliasFacade> {
      Arc::clone(&GLOBAL_FACADE)
   }

   /// Install `connection` under `alias`, replacing any earlier binding
   pub fn install(&self, alias: &str, connection: &Arc<Connection>) {
      let previous = self
         .aliases
         .write()
         .insert(alias.to_string(), Arc::downgrade(connection));
      debug!(alias, replaced = previous.is_some(), "Installed connection alias");
   }

   /// Remove `alias`. Returns whether it was installed.
   pub fn remove(&self, alias: &str) -> bool {
      self.aliases.write().remove(alias).is_some()
   }

   /// A new builder for the connection installed under `alias`.
   ///
   /// Fails with [`Error::ConnectionDropped`] once the connection is gone and
   /// forgets the alias, so later lookups report [`Error::UnknownAlias`].
   pub fn builder(&self, alias: &str) -> Result<QueryBuilderHandler> {
      let connection = self
         .aliases
         .read()
         .get(alias)
         .cloned()
         .ok_or_else(|| Error::UnknownAlias(alias.to_string()))?;

      if let Some(conn) = connection.upgrade() {
         return Ok(conn.query_builder());
      }

      let mut aliases = self.aliases.write();
      // Only prune if the alias was not reinstalled in the meantime
      if aliases.get(alias).is_some_and(|current| current.ptr_eq(&connection)) {
         aliases.remove(alias);
         debug!(alias, "Pruned alias of dropped connection");
      }
      Err(Error::ConnectionDropped(alias.to_string()))
   }

   /// Shorthand for `builder(alias)?.table(table)`
   pub fn table(&self, alias: &str, table: &str) -> Result<QueryBuilderHandler> {
      Ok(self.builder(alias)?.table(table))
   }

   /// A builder for the registry's default connection
   pub fn default_builder(&self) -> Result<QueryBuilderHandler> {
      Ok(self.registry.require_default()?.query_builder())
   }

   pub fn registry(&self) -> &Arc<ConnectionRegistry> {
      &self.registry
   }

   /// Installed alias names, sorted
   pub fn aliases(&self) -> Vec<String> {
      let mut names: Vec<_> = self.aliases.read().keys().cloned().collect();
      names.sort();
      names
   }
}
