//! To-do client with a query cache in front of reads.

use crate::cache::{QueryCache, QueryObserver};
use std::time::Duration;
use tracing::debug;

use super::client::TodoClient;
use super::error::ApiError;
use super::keys::TodoQueryKey;
use super::types::{AuthToken, Credentials, Todo, TodoCreate, TodoUpdate};

pub type TodoListObserver = QueryObserver<Vec<Todo>, ApiError>;

/// To-do client with transparent caching of the list.
///
/// Mutations go straight to the server. On success the list entry is
/// invalidated and refetched in the background; nothing is patched locally.
#[derive(Clone)]
pub struct CachedTodoClient {
  inner: TodoClient,
  cache: QueryCache<Vec<Todo>, ApiError>,
}

impl CachedTodoClient {
  pub fn new(inner: TodoClient, stale_time: Duration) -> Self {
    Self {
      inner,
      cache: QueryCache::new().with_stale_time(stale_time),
    }
  }

  pub fn client(&self) -> &TodoClient {
    &self.inner
  }

  pub async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
    // A new session must never see data fetched under the previous one
    self.cache.clear();
    self.inner.login(credentials).await
  }

  pub fn logout(&self) {
    self.inner.logout();
    self.cache.clear();
  }

  /// Drop cached data without touching the session.
  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  /// The to-do list, from cache when fresh.
  pub async fn todos(&self) -> Result<Vec<Todo>, ApiError> {
    let inner = self.inner.clone();
    let result = self
      .cache
      .fetch(&TodoQueryKey::List, move || async move { inner.list_todos().await })
      .await;
    self.after_read(result)
  }

  /// The to-do list, always from the network.
  pub async fn refetch_todos(&self) -> Result<Vec<Todo>, ApiError> {
    let inner = self.inner.clone();
    let result = self
      .cache
      .refetch(&TodoQueryKey::List, move || async move { inner.list_todos().await })
      .await;
    self.after_read(result)
  }

  /// Load the list in the background unless fresh data is cached or a
  /// fetch is already running; observers see the result.
  pub fn prefetch_todos(&self) {
    let client = self.clone();
    tokio::spawn(async move {
      // Failures are recorded on the cache entry
      let _ = client.todos().await;
    });
  }

  #[cfg(test)]
  pub fn todos_snapshot(&self) -> crate::cache::QuerySnapshot<Vec<Todo>, ApiError> {
    self.cache.snapshot(&TodoQueryKey::List)
  }

  pub fn subscribe_todos(&self) -> TodoListObserver {
    self.cache.subscribe(&TodoQueryKey::List)
  }

  pub async fn create_todo(&self, todo: &TodoCreate) -> Result<Todo, ApiError> {
    let result = self.inner.create_todo(todo).await;
    self.after_mutation(result)
  }

  pub async fn update_todo(&self, id: i64, update: &TodoUpdate) -> Result<Todo, ApiError> {
    let result = self.inner.update_todo(id, update).await;
    self.after_mutation(result)
  }

  /// Flip the completion flag of `todo`.
  pub async fn toggle_todo(&self, todo: &Todo) -> Result<Todo, ApiError> {
    self
      .update_todo(todo.id, &TodoUpdate::completed(!todo.completed))
      .await
  }

  pub async fn delete_todo(&self, id: i64) -> Result<(), ApiError> {
    let result = self.inner.delete_todo(id).await;
    self.after_mutation(result)
  }

  fn after_read<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
    if result.as_ref().is_err_and(ApiError::is_unauthorized) {
      self.cache.clear();
    }
    result
  }

  fn after_mutation<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
    match &result {
      Ok(_) => {
        self.cache.invalidate(&TodoQueryKey::List);
        // Logged out while the mutation was in flight
        if self.inner.tokens().is_authenticated() {
          debug!("Mutation succeeded; refreshing todo list");
          self.spawn_list_refetch();
        }
      }
      Err(e) if e.is_unauthorized() => self.cache.clear(),
      Err(_) => {}
    }
    result
  }

  fn spawn_list_refetch(&self) {
    let inner = self.inner.clone();
    self
      .cache
      .spawn_refetch(&TodoQueryKey::List, move || async move { inner.list_todos().await });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_support::{token_store, FakeTodoApi, RecordingNavigator, PASSWORD, USERNAME};
  use std::sync::Arc;
  use wiremock::MockServer;

  async fn setup(stale_time: Duration) -> (MockServer, FakeTodoApi, CachedTodoClient, Arc<RecordingNavigator>) {
    let (server, api) = FakeTodoApi::start().await;
    let navigator = Arc::new(RecordingNavigator::default());
    let inner = TodoClient::new(
      &server.uri(),
      Duration::from_secs(5),
      token_store(),
      navigator.clone(),
    )
    .unwrap();
    let client = CachedTodoClient::new(inner, stale_time);
    client
      .login(&Credentials::new(USERNAME, PASSWORD))
      .await
      .unwrap();
    (server, api, client, navigator)
  }

  #[tokio::test]
  async fn test_fresh_list_served_without_round_trip() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;
    api.seed("one", "");

    assert_eq!(client.todos().await.unwrap().len(), 1);
    assert_eq!(client.todos().await.unwrap().len(), 1);
    assert_eq!(api.list_calls(), 1);
  }

  #[tokio::test]
  async fn test_explicit_refetch_always_hits_network() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;

    client.todos().await.unwrap();
    api.seed("added elsewhere", "");
    let todos = client.refetch_todos().await.unwrap();

    assert_eq!(todos.len(), 1);
    assert_eq!(api.list_calls(), 2);
  }

  #[tokio::test]
  async fn test_create_then_list_includes_new_item() {
    let (_server, _api, client, _) = setup(Duration::from_secs(300)).await;
    assert!(client.todos().await.unwrap().is_empty());

    let created = client
      .create_todo(&TodoCreate::new("Buy milk", ""))
      .await
      .unwrap();
    assert!(client.todos_snapshot().is_stale);

    let todos = client.todos().await.unwrap();
    let listed = todos.iter().find(|t| t.id == created.id).unwrap();
    assert!(!listed.completed);
    assert_eq!(listed.title, "Buy milk");
  }

  #[tokio::test]
  async fn test_toggle_then_list_shows_completed() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;
    let id = api.seed("Write report", "quarterly");

    let todo = client
      .todos()
      .await
      .unwrap()
      .into_iter()
      .find(|t| t.id == id)
      .unwrap();
    client.toggle_todo(&todo).await.unwrap();

    let todo = client
      .todos()
      .await
      .unwrap()
      .into_iter()
      .find(|t| t.id == id)
      .unwrap();
    assert!(todo.completed);
    assert_eq!(todo.title, "Write report");
    assert_eq!(todo.description, "quarterly");
  }

  #[tokio::test]
  async fn test_delete_then_list_omits_item() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;
    let id = api.seed("gone", "");
    assert_eq!(client.todos().await.unwrap().len(), 1);

    client.delete_todo(id).await.unwrap();

    assert!(client.todos().await.unwrap().iter().all(|t| t.id != id));
  }

  #[tokio::test]
  async fn test_mutation_notifies_observers_with_server_state() {
    let (_server, _api, client, _) = setup(Duration::from_secs(300)).await;
    client.todos().await.unwrap();
    let mut observer = client.subscribe_todos();

    client
      .create_todo(&TodoCreate::new("from observer test", ""))
      .await
      .unwrap();

    while observer
      .snapshot()
      .data()
      .map_or(true, |todos| todos.is_empty())
    {
      assert!(observer.changed().await);
    }
    assert_eq!(observer.snapshot().data().unwrap()[0].title, "from observer test");
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_fresh() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;
    client.todos().await.unwrap();

    let result = client.update_todo(42, &TodoUpdate::completed(true)).await;
    assert!(result.is_err());
    assert!(!client.todos_snapshot().is_stale);
    assert_eq!(api.list_calls(), 1);
  }

  #[tokio::test]
  async fn test_expired_session_clears_token_and_cache() {
    let (_server, api, client, navigator) = setup(Duration::from_secs(300)).await;
    api.seed("private", "");
    client.todos().await.unwrap();
    api.expire_sessions();

    let result = client.refetch_todos().await;

    assert_eq!(result.unwrap_err(), ApiError::Unauthorized);
    assert!(!client.client().tokens().is_authenticated());
    assert!(client.todos_snapshot().data.is_none());
    assert_eq!(navigator.count(), 1);
  }

  #[tokio::test]
  async fn test_logout_clears_cached_list() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;
    api.seed("private", "");
    client.todos().await.unwrap();

    client.logout();

    assert!(client.todos_snapshot().data.is_none());
    assert!(!client.client().tokens().is_authenticated());
  }

  #[tokio::test]
  async fn test_concurrent_prefetches_share_one_request() {
    let (_server, api, client, _) = setup(Duration::from_secs(300)).await;
    api.seed("shared", "");
    let mut observer = client.subscribe_todos();

    client.prefetch_todos();
    client.prefetch_todos();
    while observer.snapshot().data().is_none() {
      assert!(observer.changed().await);
    }
    assert_eq!(api.list_calls(), 1);

    // Fresh data is not fetched again
    client.prefetch_todos();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(api.list_calls(), 1);
  }

  #[tokio::test]
  async fn test_mutation_finishing_after_logout_skips_refetch() {
    let (_server, api, client, navigator) = setup(Duration::from_secs(300)).await;
    client.logout();

    client.after_mutation(Ok(())).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(api.list_calls(), 0);
    assert_eq!(navigator.count(), 0);
    assert!(client.todos_snapshot().is_stale);
  }
}
