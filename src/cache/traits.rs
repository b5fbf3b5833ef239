//! Core traits and types for the query cache.

/// Identity of a cached resource.
///
/// Two keys with the same `cache_key` share one cache entry, one in-flight
/// request and one set of subscribers.
pub trait QueryKey {
  /// Stable identifier for the resource (e.g. "todos:list")
  fn cache_key(&self) -> String;

  /// Human-readable description, used in logs
  fn description(&self) -> String;
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<V, E> {
  /// Last successfully fetched value, kept while refetching or after an error
  pub data: Option<V>,
  /// Error from the most recent applied fetch, if it failed
  pub error: Option<E>,
  /// A fetch for this key is in flight
  pub is_loading: bool,
  /// Data is past its freshness window or was invalidated
  pub is_stale: bool,
}

impl<V, E> QuerySnapshot<V, E> {
  #[cfg(test)]
  pub(super) fn empty() -> Self {
    Self {
      data: None,
      error: None,
      is_loading: false,
      is_stale: true,
    }
  }

  pub fn data(&self) -> Option<&V> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&E> {
    self.error.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.is_loading
  }

  /// Loading with nothing to show yet.
  pub fn is_initial_load(&self) -> bool {
    self.is_loading && self.data.is_none()
  }
}
