//! Query lifecycle events

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::builder::QueryBuilderHandler;

/// Table name that matches every table
pub const ANY_TABLE: &str = ":any";

/// Callback invoked when an event fires.
///
/// Receives the builder that fired the event. A `Some` payload stops the
/// dispatch and is handed back to the firing code.
pub type EventCallback = Arc<dyn Fn(&QueryBuilderHandler) -> Option<JsonValue> + Send + Sync>;

/// Per-connection event dispatcher.
///
/// Holds at most one callback per `(event, table)` pair; registering the same
/// pair again replaces the earlier callback. Events are named by the query
/// builder as `before-<kind>` and `after-<kind>` where kind is one of
/// `select`, `insert`, `update`, `delete` or `query`.
///
/// ```
/// use sqlx_conn_lifecycle::{ANY_TABLE, EventHandler};
///
/// let events = EventHandler::new();
/// events.register_event("before-select", ANY_TABLE, |_| None);
/// assert!(events.event("before-select", ANY_TABLE).is_some());
/// assert!(events.event("before-select", "users").is_none());
/// ```
#[derive(Default)]
pub struct EventHandler {
   // (table, event) -> callback
   callbacks: RwLock<BTreeMap<(String, String), EventCallback>>,
}

impl EventHandler {
   pub fn new() -> Self {
      Self::default()
   }

   /// Register `callback` for `event` on `table`, replacing any existing one
   pub fn register_event<F>(&self, event: &str, table: &str, callback: F)
   where
      F: Fn(&QueryBuilderHandler) -> Option<JsonValue> + Send + Sync + 'static,
   {
      trace!(event, table, "Registering event callback");
      self
         .callbacks
         .write()
         .insert((table.to_string(), event.to_string()), Arc::new(callback));
   }

   /// Remove the callback for `event` on `table`. Returns whether one existed.
   pub fn remove_event(&self, event: &str, table: &str) -> bool {
      self
         .callbacks
         .write()
         .remove(&(table.to_string(), event.to_string()))
         .is_some()
   }

   /// The callback registered for `event` on `table`
   pub fn event(&self, event: &str, table: &str) -> Option<EventCallback> {
      self
         .callbacks
         .read()
         .get(&(table.to_string(), event.to_string()))
         .cloned()
   }

   /// All registered `(event, table)` pairs
   pub fn events(&self) -> Vec<(String, String)> {
      self
         .callbacks
         .read()
         .keys()
         .map(|(table, event)| (event.clone(), table.clone()))
         .collect()
   }

   /// Fire `event` for `table`.
   ///
   /// The [`ANY_TABLE`] callback runs first, then the table-specific one. The
   /// first callback that returns a payload ends the dispatch. Callbacks run
   /// without the registry lock held, so they may register or remove events.
   pub fn fire(
      &self,
      event: &str,
      table: Option<&str>,
      builder: &QueryBuilderHandler,
   ) -> Option<JsonValue> {
      let mut targets = vec![ANY_TABLE];
      if let Some(table) = table.filter(|t| *t != ANY_TABLE) {
         targets.push(table);
      }

      for target in targets {
         let Some(callback) = self.event(event, target) else {
            continue;
         };

         trace!(event, table = target, "Firing event");
         if let Some(payload) = callback(builder) {
            return Some(payload);
         }
      }

      None
   }
}

impl fmt::Debug for EventHandler {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("EventHandler")
         .field("events", &self.events())
         .finish()
   }
}
