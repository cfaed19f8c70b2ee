//! Process default connection registry

use std::sync::{Arc, LazyLock, OnceLock, Weak};

use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};

static GLOBAL_REGISTRY: LazyLock<Arc<ConnectionRegistry>> =
   LazyLock::new(|| Arc::new(ConnectionRegistry::new()));

/// Write-once slot naming the first connection that completed a connect.
///
/// The slot holds a `Weak` reference: it never keeps a connection alive, and
/// once the first registered connection is dropped, [`get_default`] returns
/// `None` without re-arming the slot for a later connection.
///
/// Connections use [`ConnectionRegistry::global`] unless one is injected
/// through [`ConnectionOptions`](crate::ConnectionOptions).
///
/// [`get_default`]: ConnectionRegistry::get_default
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
   slot: OnceLock<Weak<Connection>>,
}

impl ConnectionRegistry {
   pub fn new() -> Self {
      Self::default()
   }

   /// The process-wide registry
   pub fn global() -> Arc<ConnectionRegistry> {
      Arc::clone(&GLOBAL_REGISTRY)
   }

   /// Register `connection` if the slot is still empty.
   ///
   /// Returns `true` when this call filled the slot. An occupied slot is not
   /// an error.
   pub fn register_if_empty(&self, connection: &Arc<Connection>) -> bool {
      let registered = self.slot.set(Arc::downgrade(connection)).is_ok();
      if registered {
         debug!(adapter = %connection.adapter(), "Registered default connection");
      }
      registered
   }

   /// The default connection, if one was registered and is still alive
   pub fn get_default(&self) -> Option<Arc<Connection>> {
      self.slot.get().and_then(Weak::upgrade)
   }

   /// Like [`get_default`](Self::get_default), failing with
   /// [`Error::NoConnectionConfigured`] when there is none
   pub fn require_default(&self) -> Result<Arc<Connection>> {
      self.get_default().ok_or(Error::NoConnectionConfigured)
   }

   /// Whether the slot has ever been filled
   pub fn is_set(&self) -> bool {
      self.slot.get().is_some()
   }
}
