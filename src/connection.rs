//! Connection lifecycle: adapter selection, (re)connect and idle-timeout policy

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sqlx_conn_adapters::{
   Adapter, AdapterConfig, AdapterFactory, AdapterKind, DriverHandle, NativeAdapterFactory,
};
use tokio::sync::{MappedMutexGuard, Mutex as AsyncMutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::builder::QueryBuilderHandler;
use crate::error::{Error, Result};
use crate::events::EventHandler;
use crate::facade::AliasFacade;
use crate::registry::ConnectionRegistry;

/// Composition-root options for constructing a [`Connection`].
///
/// By default a connection registers with the process-global
/// [`ConnectionRegistry`], installs aliases into the process-global
/// [`AliasFacade`] and builds adapters with [`NativeAdapterFactory`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
   pub alias: Option<String>,
   pub registry: Arc<ConnectionRegistry>,
   pub adapter_factory: Arc<dyn AdapterFactory>,
   pub facade: Arc<AliasFacade>,
}

impl Default for ConnectionOptions {
   fn default() -> Self {
      Self {
         alias: None,
         registry: ConnectionRegistry::global(),
         adapter_factory: Arc::new(NativeAdapterFactory),
         facade: AliasFacade::global(),
      }
   }
}

impl ConnectionOptions {
   pub fn new() -> Self {
      Self::default()
   }

   /// Install the connection under `alias` once it has connected
   pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
      self.alias = Some(alias.into());
      self
   }

   pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
      self.registry = registry;
      self
   }

   pub fn with_adapter_factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
      self.adapter_factory = factory;
      self
   }

   pub fn with_facade(mut self, facade: Arc<AliasFacade>) -> Self {
      self.facade = facade;
      self
   }
}

/// Serializable description of a connection.
///
/// ```
/// use sqlx_conn_lifecycle::ConnectionSettings;
///
/// let settings = ConnectionSettings::from_json_str(
///    r#"{"adapter": "sqlite", "config": {"database": ":memory:"}, "alias": "DB"}"#,
/// )
/// .unwrap();
/// assert_eq!(settings.adapter, "sqlite");
/// assert_eq!(settings.alias.as_deref(), Some("DB"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
   pub adapter: String,
   #[serde(default)]
   pub config: AdapterConfig,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub alias: Option<String>,
}

impl ConnectionSettings {
   pub fn from_json_str(json: &str) -> Result<Self> {
      serde_json::from_str(json).map_err(|e| Error::Adapter(e.into()))
   }

   pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
      let contents = std::fs::read_to_string(path).map_err(|e| Error::Adapter(e.into()))?;
      Self::from_json_str(&contents)
   }
}

/// A managed connection to one database.
///
/// Owns the adapter selector, the adapter configuration, at most one live
/// [`DriverHandle`], the time of last activity and an [`EventHandler`].
/// Connections are shared as `Arc<Connection>`; query builders and the alias
/// facade hold references to the connection and always read the live handle
/// through it.
///
/// # Idle-timeout reconnection
///
/// When the configuration carries a positive `reconnect_timeout` (seconds),
/// [`maybe_reconnect`](Self::maybe_reconnect) re-establishes the session once
/// the time since the *previous call* reaches the timeout. Every call slides
/// the window forward, whether or not it reconnected.
///
/// # Example
///
/// ```no_run
/// use sqlx_conn_lifecycle::{AdapterConfig, Connection};
///
/// # async fn example() -> sqlx_conn_lifecycle::Result<()> {
/// let config = AdapterConfig::new()
///    .with("database", ":memory:")
///    .with("reconnect_timeout", 30);
/// let conn = Connection::new("sqlite", config).await?;
///
/// conn.maybe_reconnect().await?;
/// let rows = conn.query_builder().fetch_all("SELECT 1 AS one", vec![]).await?;
/// assert_eq!(rows.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Connection {
   adapter: RwLock<String>,
   adapter_config: RwLock<AdapterConfig>,
   handle: AsyncMutex<Option<DriverHandle>>,
   last_activity: Mutex<Option<Instant>>,
   event_handler: EventHandler,
   registry: Arc<ConnectionRegistry>,
   factory: Arc<dyn AdapterFactory>,
}

impl Connection {
   /// Connect with the default options
   pub async fn new(adapter: impl Into<String>, config: AdapterConfig) -> Result<Arc<Self>> {
      Self::with_options(adapter, config, ConnectionOptions::default()).await
   }

   /// Connect, then install the alias from `options` if one is given.
   ///
   /// Fails with a configuration error, before any adapter is built, when the
   /// selector names no known adapter.
   pub async fn with_options(
      adapter: impl Into<String>,
      config: AdapterConfig,
      options: ConnectionOptions,
   ) -> Result<Arc<Self>> {
      let connection = Arc::new(Self {
         adapter: RwLock::new(adapter.into()),
         adapter_config: RwLock::new(config),
         handle: AsyncMutex::new(None),
         last_activity: Mutex::new(None),
         event_handler: EventHandler::new(),
         registry: options.registry,
         factory: options.adapter_factory,
      });

      connection.connect().await?;

      if let Some(alias) = &options.alias {
         options.facade.install(alias, &connection);
      }

      Ok(connection)
   }

   /// Connect from loaded settings. An alias in `options` wins over the one in
   /// the settings.
   pub async fn from_settings(
      settings: ConnectionSettings,
      mut options: ConnectionOptions,
   ) -> Result<Arc<Self>> {
      if options.alias.is_none() {
         options.alias = settings.alias;
      }
      Self::with_options(settings.adapter, settings.config, options).await
   }

   /// Establish a fresh session, unconditionally.
   ///
   /// The selector is resolved first; an unknown selector fails without
   /// touching the current handle. Otherwise the current handle is closed
   /// and a new one opened. The first connection to succeed becomes the
   /// registry default. Stamps the activity time.
   ///
   /// A failed connect leaves the connection without a handle.
   pub async fn connect(self: &Arc<Self>) -> Result<()> {
      let kind: AdapterKind = self.adapter().parse()?;
      let config = self.adapter_config();

      let mut slot = self.handle.lock().await;
      if let Some(previous) = slot.take() {
         let previous_id = previous.id();
         if let Err(e) = previous.close().await {
            warn!(handle_id = previous_id, error = %e, "Failed to close previous driver handle");
         }
      }

      let adapter = self.factory.build(kind);
      let handle = adapter.connect(&config).await?;
      info!(adapter = %kind, handle_id = handle.id(), "Connected");
      *slot = Some(handle);
      drop(slot);

      self.registry.register_if_empty(self);
      *self.last_activity.lock() = Some(Instant::now());

      Ok(())
   }

   /// Apply the idle-timeout policy. Returns whether a reconnect happened.
   ///
   /// A no-op when no positive `reconnect_timeout` is configured or when the
   /// connection has never connected. A failed reconnect is returned to the
   /// caller and not retried.
   pub async fn maybe_reconnect(self: &Arc<Self>) -> Result<bool> {
      let timeout = self.reconnect_timeout();
      let last_activity = self.last_activity();
      let (Some(timeout), Some(last_activity)) = (timeout, last_activity) else {
         return Ok(false);
      };

      let idle = Instant::now().saturating_duration_since(last_activity);
      let reconnected = idle >= timeout;
      if reconnected {
         debug!(idle_ms = idle.as_millis() as u64, "Idle timeout reached, reconnecting");
         self.connect().await?;
      }

      *self.last_activity.lock() = Some(Instant::now());
      Ok(reconnected)
   }

   /// The adapter selector as given
   pub fn adapter(&self) -> String {
      self.adapter.read().clone()
   }

   /// Change the selector used by the next [`connect`](Self::connect)
   pub fn set_adapter(&self, adapter: impl Into<String>) -> &Self {
      *self.adapter.write() = adapter.into();
      self
   }

   pub fn adapter_config(&self) -> AdapterConfig {
      self.adapter_config.read().clone()
   }

   /// Replace the whole configuration used by the next connect and by the
   /// idle policy
   pub fn set_adapter_config(&self, config: AdapterConfig) -> &Self {
      *self.adapter_config.write() = config;
      self
   }

   /// Configured idle timeout, if the policy is enabled
   pub fn reconnect_timeout(&self) -> Option<Duration> {
      self.adapter_config.read().reconnect_timeout()
   }

   /// Exclusive access to the live driver handle.
   ///
   /// Fails with [`Error::NotConnected`] when there is no handle, for example
   /// after a failed reconnect.
   pub async fn driver_handle(&self) -> Result<MappedMutexGuard<'_, DriverHandle>> {
      let slot = self.handle.lock().await;
      MutexGuard::try_map(slot, |handle| handle.as_mut()).map_err(|_| Error::NotConnected)
   }

   /// Install `handle` as the live handle, returning the one it replaces
   pub async fn set_driver_handle(&self, handle: DriverHandle) -> Option<DriverHandle> {
      self.handle.lock().await.replace(handle)
   }

   /// Identity of the live driver handle
   pub async fn handle_id(&self) -> Option<u64> {
      self.handle.lock().await.as_ref().map(DriverHandle::id)
   }

   pub async fn is_connected(&self) -> bool {
      self.handle.lock().await.is_some()
   }

   /// Time of the last connect or idle-policy check
   pub fn last_activity(&self) -> Option<Instant> {
      *self.last_activity.lock()
   }

   pub fn event_handler(&self) -> &EventHandler {
      &self.event_handler
   }

   pub fn registry(&self) -> &Arc<ConnectionRegistry> {
      &self.registry
   }

   /// A new query builder bound to this connection
   pub fn query_builder(self: &Arc<Self>) -> QueryBuilderHandler {
      QueryBuilderHandler::new(Arc::clone(self))
   }
}

impl fmt::Debug for Connection {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Connection")
         .field("adapter", &*self.adapter.read())
         .field("last_activity", &self.last_activity())
         .field("event_handler", &self.event_handler)
         .finish_non_exhaustive()
   }
}
