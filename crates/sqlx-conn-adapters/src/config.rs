//! Opaque adapter configuration

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Result;
use crate::error::Error;
use crate::kind::AdapterKind;

/// Configuration key interpreted by the connection lifecycle itself
pub const RECONNECT_TIMEOUT_KEY: &str = "reconnect_timeout";

/// Key holding driver-specific options as a nested object
pub const OPTIONS_KEY: &str = "options";

/// Configuration mapping handed to an adapter.
///
/// No schema is enforced here: every key passes through to the adapter, which
/// validates what it needs. The only key with lifecycle meaning is
/// [`RECONNECT_TIMEOUT_KEY`].
///
/// # Examples
///
/// ```
/// use sqlx_conn_adapters::AdapterConfig;
/// use std::time::Duration;
///
/// let config = AdapterConfig::new()
///    .with("database", ":memory:")
///    .with("reconnect_timeout", 5);
///
/// assert_eq!(config.reconnect_timeout(), Some(Duration::from_secs(5)));
///
/// let from_json = AdapterConfig::from_json_str(r#"{"database": "app.db"}"#).unwrap();
/// assert_eq!(from_json.reconnect_timeout(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterConfig(IndexMap<String, JsonValue>);

impl AdapterConfig {
   pub fn new() -> Self {
      Self::default()
   }

   /// Parse a configuration from a JSON object
   pub fn from_json_str(json: &str) -> Result<Self> {
      Ok(serde_json::from_str(json)?)
   }

   /// Read and parse a JSON configuration file
   pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
      let contents = std::fs::read_to_string(path)?;
      Self::from_json_str(&contents)
   }

   /// Set a key, consuming and returning the configuration
   pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
      self.0.insert(key.into(), value.into());
      self
   }

   pub fn get(&self, key: &str) -> Option<&JsonValue> {
      self.0.get(key)
   }

   pub fn contains_key(&self, key: &str) -> bool {
      self.0.contains_key(key)
   }

   pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
      self.0.iter()
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }

   /// Idle window after which the next lifecycle check reconnects.
   ///
   /// Accepts a positive integer, a positive float, or a numeric string (in
   /// seconds). Anything else, including zero, disables the policy. Values
   /// too large for a `Duration` saturate to `Duration::MAX`.
   pub fn reconnect_timeout(&self) -> Option<Duration> {
      let seconds = match self.get(RECONNECT_TIMEOUT_KEY)? {
         JsonValue::Number(n) => n.as_f64()?,
         JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
         _ => return None,
      };

      if seconds.is_nan() || seconds <= 0.0 {
         return None;
      }
      Some(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
   }

   /// Read a string value. Numbers are accepted and rendered as text; null is
   /// treated as absent.
   pub fn string(&self, adapter: AdapterKind, key: &str) -> Result<Option<String>> {
      match self.get(key) {
         None | Some(JsonValue::Null) => Ok(None),
         Some(JsonValue::String(s)) => Ok(Some(s.clone())),
         Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
         Some(other) => Err(Error::invalid_config(
            adapter,
            format!("`{key}` must be a string, got {other}"),
         )),
      }
   }

   /// Read a string value that must be present and non-empty
   pub fn required_string(&self, adapter: AdapterKind, key: &str) -> Result<String> {
      match self.string(adapter, key)? {
         Some(value) if !value.is_empty() => Ok(value),
         _ => Err(Error::invalid_config(
            adapter,
            format!("missing required key `{key}`"),
         )),
      }
   }

   /// Read a non-negative integer; numeric strings are accepted
   pub fn unsigned(&self, adapter: AdapterKind, key: &str) -> Result<Option<u64>> {
      let parsed = match self.get(key) {
         None | Some(JsonValue::Null) => return Ok(None),
         Some(JsonValue::Number(n)) => n.as_u64(),
         Some(JsonValue::String(s)) => s.trim().parse::<u64>().ok(),
         Some(_) => None,
      };

      parsed.map(Some).ok_or_else(|| {
         Error::invalid_config(adapter, format!("`{key}` must be a non-negative integer"))
      })
   }

   /// Read the `port` key as a TCP port
   pub fn port(&self, adapter: AdapterKind) -> Result<Option<u16>> {
      match self.unsigned(adapter, "port")? {
         None => Ok(None),
         Some(port) => u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .map(Some)
            .ok_or_else(|| Error::invalid_config(adapter, format!("port {port} is out of range"))),
      }
   }

   /// Read a boolean flag; `0`/`1` are accepted as well
   pub fn bool_flag(&self, adapter: AdapterKind, key: &str) -> Result<Option<bool>> {
      match self.get(key) {
         None | Some(JsonValue::Null) => Ok(None),
         Some(JsonValue::Bool(b)) => Ok(Some(*b)),
         Some(JsonValue::Number(n)) if n.as_u64() == Some(0) => Ok(Some(false)),
         Some(JsonValue::Number(n)) if n.as_u64() == Some(1) => Ok(Some(true)),
         Some(_) => Err(Error::invalid_config(
            adapter,
            format!("`{key}` must be a boolean"),
         )),
      }
   }

   /// Driver-specific options nested under [`OPTIONS_KEY`]
   pub fn options(&self, adapter: AdapterKind) -> Result<AdapterConfig> {
      match self.get(OPTIONS_KEY) {
         None | Some(JsonValue::Null) => Ok(AdapterConfig::new()),
         Some(JsonValue::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
         Some(_) => Err(Error::invalid_config(
            adapter,
            format!("`{OPTIONS_KEY}` must be an object"),
         )),
      }
   }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for AdapterConfig {
   fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
      Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
   }
}

impl From<IndexMap<String, JsonValue>> for AdapterConfig {
   fn from(map: IndexMap<String, JsonValue>) -> Self {
      Self(map)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   const KIND: AdapterKind = AdapterKind::Mysql;

   #[test]
   fn test_reconnect_timeout_disabled_when_empty() {
      for value in [json!(null), json!(0), json!("0"), json!(""), json!(false), json!(-3), json!([])] {
         let config = AdapterConfig::new().with(RECONNECT_TIMEOUT_KEY, value.clone());
         assert_eq!(config.reconnect_timeout(), None, "value {value} should disable");
      }
      assert_eq!(AdapterConfig::new().reconnect_timeout(), None);
   }

   #[test]
   fn test_reconnect_timeout_accepts_numbers_and_numeric_strings() {
      let secs = |v: JsonValue| AdapterConfig::new().with(RECONNECT_TIMEOUT_KEY, v).reconnect_timeout();
      assert_eq!(secs(json!(30)), Some(Duration::from_secs(30)));
      assert_eq!(secs(json!("30")), Some(Duration::from_secs(30)));
      assert_eq!(secs(json!(1.5)), Some(Duration::from_millis(1500)));
   }

   #[test]
   fn test_reconnect_timeout_saturates_when_too_large() {
      let secs = |v: JsonValue| AdapterConfig::new().with(RECONNECT_TIMEOUT_KEY, v).reconnect_timeout();
      assert_eq!(secs(json!(u64::MAX)), Some(Duration::MAX));
      assert_eq!(secs(json!("1e30")), Some(Duration::MAX));
      assert_eq!(secs(json!(1e20)), Some(Duration::MAX));
      assert_eq!(secs(json!("inf")), Some(Duration::MAX));
      assert_eq!(secs(json!("NaN")), None);
      assert_eq!(secs(json!("-1e30")), None);
   }

   #[test]
   fn test_string_reader() {
      let config = AdapterConfig::new()
         .with("host", "db.local")
         .with("password", 1234)
         .with("username", json!(["nope"]));

      assert_eq!(config.string(KIND, "host").unwrap().as_deref(), Some("db.local"));
      assert_eq!(config.string(KIND, "password").unwrap().as_deref(), Some("1234"));
      assert_eq!(config.string(KIND, "missing").unwrap(), None);
      assert!(config.string(KIND, "username").unwrap_err().is_configuration_error());
   }

   #[test]
   fn test_required_string_rejects_empty() {
      let config = AdapterConfig::new().with("database", "");
      let err = config.required_string(KIND, "database").unwrap_err();
      assert!(err.to_string().contains("missing required key `database`"));
   }

   #[test]
   fn test_port_reader() {
      let port = |v: JsonValue| AdapterConfig::new().with("port", v).port(KIND);
      assert_eq!(port(json!(3306)).unwrap(), Some(3306));
      assert_eq!(port(json!("5432")).unwrap(), Some(5432));
      assert!(port(json!(70000)).is_err());
      assert!(port(json!(0)).is_err());
      assert!(port(json!("abc")).is_err());
      assert_eq!(AdapterConfig::new().port(KIND).unwrap(), None);
   }

   #[test]
   fn test_options_must_be_object() {
      let config = AdapterConfig::new().with(OPTIONS_KEY, json!({"ssl_mode": "required"}));
      let options = config.options(KIND).unwrap();
      assert_eq!(options.string(KIND, "ssl_mode").unwrap().as_deref(), Some("required"));

      let bad = AdapterConfig::new().with(OPTIONS_KEY, "ssl");
      assert!(bad.options(KIND).is_err());
   }

   #[test]
   fn test_json_round_trip_preserves_order() {
      let config = AdapterConfig::from_json_str(r#"{"host":"a","database":"b","port":1}"#).unwrap();
      let keys: Vec<_> = config.iter().map(|(k, _)| k.as_str()).collect();
      assert_eq!(keys, vec!["host", "database", "port"]);
      assert!(AdapterConfig::from_json_str("[1,2]").unwrap_err().is_configuration_error());
   }
}
