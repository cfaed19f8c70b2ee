use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use sqlx_conn_adapters::SqliteAdapter;
use sqlx_conn_lifecycle::{
   Adapter, AdapterConfig, AdapterFactory, AdapterKind, AliasFacade, Connection, ConnectionOptions,
   ConnectionRegistry, ConnectionSettings, Error, NativeAdapterFactory,
};
use tempfile::TempDir;
use tokio::time::{Instant, advance};

/// Native factory that counts adapter instantiations
#[derive(Debug, Default)]
struct CountingFactory {
   builds: AtomicUsize,
}

impl CountingFactory {
   fn builds(&self) -> usize {
      self.builds.load(Ordering::SeqCst)
   }
}

impl AdapterFactory for CountingFactory {
   fn build(&self, kind: AdapterKind) -> Box<dyn Adapter> {
      self.builds.fetch_add(1, Ordering::SeqCst);
      NativeAdapterFactory.build(kind)
   }
}

fn init_tracing() {
   let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn isolated_options(factory: &Arc<CountingFactory>) -> ConnectionOptions {
   ConnectionOptions::new()
      .with_registry(Arc::new(ConnectionRegistry::new()))
      .with_facade(Arc::new(AliasFacade::new()))
      .with_adapter_factory(Arc::clone(factory) as Arc<dyn AdapterFactory>)
}

fn memory_config(reconnect_timeout: Option<serde_json::Value>) -> AdapterConfig {
   let config = AdapterConfig::new().with("database", ":memory:");
   match reconnect_timeout {
      Some(timeout) => config.with("reconnect_timeout", timeout),
      None => config,
   }
}

async fn connect_isolated(
   config: AdapterConfig,
) -> (Arc<Connection>, Arc<CountingFactory>) {
   let factory = Arc::new(CountingFactory::default());
   let conn = Connection::with_options("sqlite", config, isolated_options(&factory))
      .await
      .unwrap();
   (conn, factory)
}

#[tokio::test(start_paused = true)]
async fn test_connect_sets_handle_and_activity() {
   init_tracing();
   let started = Instant::now();
   let (conn, factory) = connect_isolated(memory_config(None)).await;

   assert!(conn.is_connected().await);
   assert!(conn.handle_id().await.is_some());
   assert_eq!(conn.last_activity(), Some(started));
   assert_eq!(conn.adapter(), "sqlite");
   assert_eq!(conn.adapter_config(), memory_config(None));
   assert_eq!(factory.builds(), 1);

   let mut handle = conn.driver_handle().await.unwrap();
   assert_eq!(handle.kind(), AdapterKind::Sqlite);
   handle.ping().await.unwrap();
}

#[tokio::test]
async fn test_selector_is_case_insensitive() {
   let factory = Arc::new(CountingFactory::default());
   let conn = Connection::with_options("SQLite", memory_config(None), isolated_options(&factory))
      .await
      .unwrap();
   assert!(conn.is_connected().await);
}

#[tokio::test]
async fn test_unknown_adapter_fails_before_building_adapter() {
   let factory = Arc::new(CountingFactory::default());
   let options = isolated_options(&factory);
   let registry = Arc::clone(&options.registry);

   let err = Connection::with_options("oracle", memory_config(None), options)
      .await
      .unwrap_err();

   assert!(err.is_configuration_error(), "unexpected error: {err}");
   assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
   assert_eq!(factory.builds(), 0);
   assert!(!registry.is_set());
}

#[tokio::test]
async fn test_malformed_config_is_configuration_error() {
   let factory = Arc::new(CountingFactory::default());
   let err = Connection::with_options("sqlite", AdapterConfig::new(), isolated_options(&factory))
      .await
      .unwrap_err();

   assert!(err.is_configuration_error());
   assert!(!err.is_connection_error());
}

#[tokio::test]
async fn test_unreachable_database_is_connection_error() {
   let temp_dir = TempDir::new().unwrap();
   let config = AdapterConfig::new()
      .with("database", temp_dir.path().join("missing.db").to_string_lossy().to_string())
      .with("options", json!({"create_if_missing": false}));

   let factory = Arc::new(CountingFactory::default());
   let options = isolated_options(&factory);
   let registry = Arc::clone(&options.registry);

   let err = Connection::with_options("sqlite", config, options)
      .await
      .unwrap_err();

   assert!(err.is_connection_error(), "unexpected error: {err}");
   assert_eq!(err.error_code(), "CONNECTION_ERROR");
   assert!(registry.get_default().is_none());
}

#[tokio::test]
async fn test_connect_always_opens_fresh_handle() {
   let (conn, factory) = connect_isolated(memory_config(None)).await;
   let first = conn.handle_id().await.unwrap();

   conn.connect().await.unwrap();
   let second = conn.handle_id().await.unwrap();

   assert_ne!(first, second);
   assert_eq!(factory.builds(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_policy_never_reconnects() {
   for timeout in [None, Some(json!(0)), Some(json!("0")), Some(json!(null))] {
      let (conn, factory) = connect_isolated(memory_config(timeout.clone())).await;
      let handle_id = conn.handle_id().await;

      for _ in 0..5 {
         advance(Duration::from_secs(3600)).await;
         assert!(!conn.maybe_reconnect().await.unwrap(), "timeout {timeout:?}");
      }

      assert_eq!(factory.builds(), 1);
      assert_eq!(conn.handle_id().await, handle_id);
   }
}

#[tokio::test(start_paused = true)]
async fn test_idle_window_slides_from_last_call() {
   let timeout = Duration::from_secs(10);
   let (conn, factory) = connect_isolated(memory_config(Some(json!(10)))).await;
   let original = conn.handle_id().await;

   // One second short of the timeout: no reconnect, but the window moves
   advance(timeout - Duration::from_secs(1)).await;
   assert!(!conn.maybe_reconnect().await.unwrap());
   assert_eq!(conn.last_activity(), Some(Instant::now()));
   assert_eq!(conn.handle_id().await, original);

   // Well past the original connect, but still inside the slid window
   advance(timeout - Duration::from_secs(1)).await;
   assert!(!conn.maybe_reconnect().await.unwrap());
   assert_eq!(factory.builds(), 1);

   // A full timeout after the last call
   advance(timeout).await;
   assert!(conn.maybe_reconnect().await.unwrap());
   assert_eq!(factory.builds(), 2);
   assert_ne!(conn.handle_id().await, original);
   assert_eq!(conn.last_activity(), Some(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_memory_sqlite_reconnects_after_idle_timeout() {
   let (conn, factory) = connect_isolated(memory_config(Some(json!(5)))).await;
   let original = conn.handle_id().await.unwrap();

   assert!(!conn.maybe_reconnect().await.unwrap());
   assert_eq!(conn.handle_id().await, Some(original));

   advance(Duration::from_secs(6)).await;
   assert!(conn.maybe_reconnect().await.unwrap());

   let refreshed = conn.handle_id().await.unwrap();
   assert_ne!(refreshed, original);
   assert_eq!(factory.builds(), 2);

   // The window restarted with the reconnect
   assert!(!conn.maybe_reconnect().await.unwrap());
   assert_eq!(conn.handle_id().await, Some(refreshed));
}

#[tokio::test(start_paused = true)]
async fn test_fractional_and_string_timeouts() {
   let (conn, _) = connect_isolated(memory_config(Some(json!("2")))).await;
   assert_eq!(conn.reconnect_timeout(), Some(Duration::from_secs(2)));
   advance(Duration::from_secs(2)).await;
   assert!(conn.maybe_reconnect().await.unwrap());

   let (conn, _) = connect_isolated(memory_config(Some(json!(0.5)))).await;
   advance(Duration::from_millis(400)).await;
   assert!(!conn.maybe_reconnect().await.unwrap());
   advance(Duration::from_millis(500)).await;
   assert!(conn.maybe_reconnect().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_surfaces_and_leaves_connection_unconnected() {
   let temp_dir = TempDir::new().unwrap();
   let (conn, factory) = connect_isolated(memory_config(Some(json!(1)))).await;
   let stamped = conn.last_activity();

   conn.set_adapter_config(
      AdapterConfig::new()
         .with("database", temp_dir.path().join("missing.db").to_string_lossy().to_string())
         .with("reconnect_timeout", 1)
         .with("options", json!({"create_if_missing": false})),
   );

   advance(Duration::from_secs(2)).await;
   let err = conn.maybe_reconnect().await.unwrap_err();
   assert!(err.is_connection_error(), "unexpected error: {err}");
   assert_eq!(factory.builds(), 2);

   // Not retried, not stamped, and the handle is gone
   assert!(!conn.is_connected().await);
   assert_eq!(conn.last_activity(), stamped);
   assert!(matches!(conn.driver_handle().await, Err(Error::NotConnected)));
   assert!(matches!(
      conn.query_builder().fetch_all("SELECT 1", vec![]).await,
      Err(ref e) if e.is_connection_error()
   ));

   // Restoring the configuration lets the next check recover
   conn.set_adapter_config(memory_config(Some(json!(1))));
   assert!(conn.maybe_reconnect().await.unwrap());
   assert!(conn.is_connected().await);
}

#[tokio::test]
async fn test_unknown_adapter_on_reconnect_keeps_current_handle() {
   let (conn, factory) = connect_isolated(memory_config(None)).await;
   let handle_id = conn.handle_id().await;

   conn.set_adapter("oracle");
   let err = conn.connect().await.unwrap_err();

   assert!(err.is_configuration_error());
   assert_eq!(factory.builds(), 1);
   assert_eq!(conn.handle_id().await, handle_id);

   conn.set_adapter("sqlite");
   conn.connect().await.unwrap();
   assert_ne!(conn.handle_id().await, handle_id);
}

#[tokio::test]
async fn test_first_connection_becomes_registry_default() {
   let registry = Arc::new(ConnectionRegistry::new());
   let options = || {
      ConnectionOptions::new()
         .with_registry(Arc::clone(&registry))
         .with_facade(Arc::new(AliasFacade::new()))
   };

   assert!(registry.get_default().is_none());
   assert!(matches!(registry.require_default(), Err(Error::NoConnectionConfigured)));

   let first = Connection::with_options("sqlite", memory_config(None), options())
      .await
      .unwrap();
   let second = Connection::with_options("sqlite", memory_config(None), options())
      .await
      .unwrap();

   let default = registry.get_default().unwrap();
   assert!(Arc::ptr_eq(&default, &first));
   assert!(!Arc::ptr_eq(&default, &second));

   // Reconnecting the second connection does not move the default
   second.connect().await.unwrap();
   assert!(!registry.register_if_empty(&second));
   assert!(Arc::ptr_eq(&registry.get_default().unwrap(), &first));
   assert!(Arc::ptr_eq(first.registry(), &registry));
}

#[tokio::test]
async fn test_registry_does_not_own_or_rearm() {
   let registry = Arc::new(ConnectionRegistry::new());
   let options = || ConnectionOptions::new().with_registry(Arc::clone(&registry));

   let first = Connection::with_options("sqlite", memory_config(None), options())
      .await
      .unwrap();
   let weak = Arc::downgrade(&first);
   drop(first);

   assert!(weak.upgrade().is_none());
   assert!(registry.is_set());
   assert!(registry.get_default().is_none());

   let _later = Connection::with_options("sqlite", memory_config(None), options())
      .await
      .unwrap();
   assert!(registry.get_default().is_none());
   assert!(matches!(registry.require_default(), Err(Error::NoConnectionConfigured)));
}

#[tokio::test]
async fn test_set_driver_handle_replaces_live_handle() {
   let (conn, _) = connect_isolated(memory_config(None)).await;
   let original = conn.handle_id().await.unwrap();

   let replacement = SqliteAdapter.connect(&memory_config(None)).await.unwrap();
   let replacement_id = replacement.id();

   let previous = conn.set_driver_handle(replacement).await.unwrap();
   assert_eq!(previous.id(), original);
   previous.close().await.unwrap();

   assert_eq!(conn.handle_id().await, Some(replacement_id));
}

#[tokio::test]
async fn test_connection_from_settings_file_installs_alias() {
   let temp_dir = TempDir::new().unwrap();
   let settings_path = temp_dir.path().join("database.json");
   let db_path = temp_dir.path().join("app.db");
   std::fs::write(
      &settings_path,
      json!({
         "adapter": "sqlite",
         "config": {"database": db_path.to_string_lossy(), "reconnect_timeout": 30},
         "alias": "AppDb",
      })
      .to_string(),
   )
   .unwrap();

   let settings = ConnectionSettings::from_json_file(&settings_path).unwrap();
   let facade = Arc::new(AliasFacade::new());
   let options = ConnectionOptions::new()
      .with_registry(Arc::new(ConnectionRegistry::new()))
      .with_facade(Arc::clone(&facade));

   let conn = Connection::from_settings(settings, options).await.unwrap();

   assert_eq!(conn.reconnect_timeout(), Some(Duration::from_secs(30)));
   assert_eq!(facade.aliases(), vec!["AppDb".to_string()]);
   let builder = facade.builder("AppDb").unwrap();
   assert!(Arc::ptr_eq(builder.connection(), &conn));
   assert!(db_path.exists());
}

#[test]
fn test_settings_reject_malformed_documents() {
   let err = ConnectionSettings::from_json_str("{\"config\": {}}").unwrap_err();
   assert!(err.is_configuration_error());

   let temp_dir = TempDir::new().unwrap();
   let err = ConnectionSettings::from_json_file(temp_dir.path().join("absent.json")).unwrap_err();
   assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn test_global_instances_are_shared() {
   assert!(Arc::ptr_eq(&ConnectionRegistry::global(), &ConnectionRegistry::global()));
   assert!(Arc::ptr_eq(&AliasFacade::global(), &AliasFacade::global()));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_timeout_never_expires() {
   for timeout in [json!("1e30"), json!(u64::MAX)] {
      let (conn, factory) = connect_isolated(memory_config(Some(timeout))).await;
      assert_eq!(conn.reconnect_timeout(), Some(Duration::MAX));

      advance(Duration::from_secs(86_400 * 365)).await;
      assert!(!conn.maybe_reconnect().await.unwrap());
      assert_eq!(conn.last_activity(), Some(Instant::now()));

      let rows = conn.query_builder().fetch_all("SELECT 1 AS one", vec![]).await.unwrap();
      assert_eq!(rows[0]["one"], json!(1));
      assert_eq!(factory.builds(), 1);
   }
}
