//! Run-scoped key/value store shared between targets.
//!
//! Values are held as JSON so that heterogeneous data (version records, paths,
//! plain strings) can live in one ordered map while bodies still read them back
//! through typed accessors. A write is visible to every target that runs after
//! it; reading a key nobody wrote is an error, never a silent default.

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by [`BuildContext`] accessors.
#[derive(Debug, Error)]
pub enum ContextError {
  /// The key was never written in this run.
  #[error("context key '{0}' was never set")]
  MissingKey(String),

  /// The stored value cannot be read as the requested type.
  #[error("context key '{key}' does not hold a {expected}: {source}")]
  TypeMismatch {
    key: String,
    expected: &'static str,
    #[source]
    source: serde_json::Error,
  },

  /// The value could not be converted for storage.
  #[error("cannot store context key '{key}': {source}")]
  Unserializable {
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Ordered key/value register for one execution run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BuildContext {
  values: IndexMap<String, Value>,
}

impl BuildContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read `key` as `T`.
  ///
  /// # Errors
  ///
  /// `MissingKey` if the key was never set, `TypeMismatch` if the stored value
  /// has a different shape than `T`.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
    let value = self.get_value(key)?;
    T::deserialize(value).map_err(|source| ContextError::TypeMismatch {
      key: key.to_string(),
      expected: std::any::type_name::<T>(),
      source,
    })
  }

  /// Borrow the raw stored value.
  pub fn get_value(&self, key: &str) -> Result<&Value, ContextError> {
    self
      .values
      .get(key)
      .ok_or_else(|| ContextError::MissingKey(key.to_string()))
  }

  /// Borrow a string value without cloning it.
  pub fn get_str(&self, key: &str) -> Result<&str, ContextError> {
    let value = self.get_value(key)?;
    value.as_str().ok_or_else(|| ContextError::TypeMismatch {
      key: key.to_string(),
      expected: "string",
      source: <serde_json::Error as serde::de::Error>::custom(format!("found {value}")),
    })
  }

  /// Store `value` under `key`. The last write wins; the key keeps its
  /// original position when overwritten.
  pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<(), ContextError> {
    let key = key.into();
    let value = serde_json::to_value(value).map_err(|source| ContextError::Unserializable {
      key: key.clone(),
      source,
    })?;
    self.values.insert(key, value);
    Ok(())
  }

  /// Store an already-converted value. Infallible.
  pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
    self.values.insert(key.into(), value);
  }

  pub fn has(&self, key: &str) -> bool {
    self.values.contains_key(key)
  }

  /// Keys in first-insertion order.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.values.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

impl<K: Into<String>> FromIterator<(K, Value)> for BuildContext {
  fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
    Self {
      values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
  }
}
