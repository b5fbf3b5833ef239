//! Subscription handle for views that redraw when a cache entry changes.
//!
//! # Example
//!
//! ```ignore
//! let mut todos = client.subscribe_todos();
//!
//! // In event loop tick
//! if todos.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! let snapshot = todos.snapshot();
//! if snapshot.is_initial_load() {
//!     render_spinner();
//! } else if let Some(items) = snapshot.data() {
//!     render_items(items);
//! }
//! ```

use tokio::sync::mpsc;

use super::traits::QuerySnapshot;

/// Receives snapshots of one cache key and keeps the latest.
pub struct QueryObserver<V, E> {
  latest: QuerySnapshot<V, E>,
  receiver: mpsc::UnboundedReceiver<QuerySnapshot<V, E>>,
}

impl<V, E> QueryObserver<V, E> {
  pub(super) fn new(
    current: QuerySnapshot<V, E>,
    receiver: mpsc::UnboundedReceiver<QuerySnapshot<V, E>>,
  ) -> Self {
    Self {
      latest: current,
      receiver,
    }
  }

  /// The most recent snapshot received.
  pub fn snapshot(&self) -> &QuerySnapshot<V, E> {
    &self.latest
  }

  /// Drain pending notifications without blocking.
  ///
  /// Returns `true` if the snapshot changed. Call this in your event loop
  /// tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(snapshot) = self.receiver.try_recv() {
      self.latest = snapshot;
      changed = true;
    }
    changed
  }

  /// Wait for the next notification.
  ///
  /// Returns `false` once the cache has been dropped.
  #[cfg(test)]
  pub async fn changed(&mut self) -> bool {
    match self.receiver.recv().await {
      Some(snapshot) => {
        self.latest = snapshot;
        true
      }
      None => false,
    }
  }
}

impl<V: std::fmt::Debug, E: std::fmt::Debug> std::fmt::Debug for QueryObserver<V, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("latest", &self.latest)
      .finish_non_exhaustive()
  }
}
