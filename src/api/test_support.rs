//! Shared fixtures for API tests: a recording navigator and an in-memory
//! fake of the to-do server mounted on a wiremock server.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use super::http::Navigator;
use crate::session::{SqliteStorage, TokenStore};

pub fn token_store() -> Arc<TokenStore> {
  Arc::new(TokenStore::load(Arc::new(SqliteStorage::in_memory().unwrap())))
}

/// Counts forced navigations to the login view.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
  calls: AtomicUsize,
}

impl RecordingNavigator {
  pub fn count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Navigator for RecordingNavigator {
  fn force_login(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
  }
}

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
struct FakeState {
  todos: Vec<Value>,
  next_id: i64,
  valid_token: Option<String>,
  issued: usize,
}

/// Stateful stand-in for the REST API.
#[derive(Clone, Default)]
pub struct FakeTodoApi {
  state: Arc<Mutex<FakeState>>,
  list_calls: Arc<AtomicUsize>,
}

impl FakeTodoApi {
  pub async fn start() -> (MockServer, FakeTodoApi) {
    let server = MockServer::start().await;
    let api = FakeTodoApi::default();
    Mock::given(any())
      .respond_with(api.clone())
      .mount(&server)
      .await;
    (server, api)
  }

  /// Number of `GET /todos` requests served.
  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  /// Reject every token issued so far, as if it had expired.
  pub fn expire_sessions(&self) {
    self.state.lock().unwrap().valid_token = None;
  }

  pub fn seed(&self, title: &str, description: &str) -> i64 {
    let mut state = self.state.lock().unwrap();
    state.next_id += 1;
    let id = state.next_id;
    state.todos.push(todo_json(id, title, description, false));
    id
  }

  fn authorized(state: &FakeState, request: &Request) -> bool {
    let sent = request
      .headers
      .get("authorization")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "));
    matches!((sent, state.valid_token.as_deref()), (Some(a), Some(b)) if a == b)
  }
}

impl Respond for FakeTodoApi {
  fn respond(&self, request: &Request) -> ResponseTemplate {
    let mut state = self.state.lock().unwrap();
    let method = request.method.as_str();
    let segments: Vec<&str> = request
      .url
      .path_segments()
      .map(|s| s.filter(|p| !p.is_empty()).collect())
      .unwrap_or_default();

    if method == "POST" && segments == ["login"] {
      let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
      if body["username"] == USERNAME && body["password"] == PASSWORD {
        state.issued += 1;
        let token = format!("token-{}", state.issued);
        state.valid_token = Some(token.clone());
        return ResponseTemplate::new(200)
          .set_body_json(json!({ "access_token": token, "token_type": "bearer" }));
      }
      return ResponseTemplate::new(401).set_body_json(json!({ "detail": "Incorrect username or password" }));
    }

    if !Self::authorized(&state, request) {
      return ResponseTemplate::new(401).set_body_json(json!({ "detail": "Could not validate credentials" }));
    }

    match (method, segments.as_slice()) {
      ("GET", ["todos"]) => {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_json(Value::Array(state.todos.clone()))
      }
      ("POST", ["todos"]) => {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let Some(title) = body["title"].as_str().filter(|t| !t.trim().is_empty()) else {
          return ResponseTemplate::new(400);
        };
        state.next_id += 1;
        let todo = todo_json(
          state.next_id,
          title,
          body["description"].as_str().unwrap_or(""),
          false,
        );
        state.todos.push(todo.clone());
        ResponseTemplate::new(201).set_body_json(todo)
      }
      ("PUT", ["todos", id]) => {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let Some(todo) = find(&mut state.todos, id) else {
          return ResponseTemplate::new(404);
        };
        for field in ["title", "description", "completed"] {
          if let Some(value) = body.get(field) {
            todo[field] = value.clone();
          }
        }
        todo["updated_at"] = json!("2024-06-01T12:00:00");
        ResponseTemplate::new(200).set_body_json(todo.clone())
      }
      ("DELETE", ["todos", id]) => {
        let before = state.todos.len();
        state.todos.retain(|t| t["id"].to_string() != *id);
        if state.todos.len() == before {
          ResponseTemplate::new(404)
        } else {
          ResponseTemplate::new(204)
        }
      }
      _ => ResponseTemplate::new(404),
    }
  }
}

fn find<'a>(todos: &'a mut [Value], id: &str) -> Option<&'a mut Value> {
  todos.iter_mut().find(|t| t["id"].to_string() == id)
}

pub fn todo_json(id: i64, title: &str, description: &str, completed: bool) -> Value {
  json!({
    "id": id,
    "title": title,
    "description": description,
    "completed": completed,
    "user_id": 1,
    "created_at": "2024-06-01T09:00:00.000000",
  })
}

/// Cached client against `base_url` with a fresh in-memory session.
pub fn cached_client(base_url: &str) -> super::CachedTodoClient {
  let inner = super::TodoClient::new(
    base_url,
    std::time::Duration::from_secs(5),
    token_store(),
    Arc::new(RecordingNavigator::default()),
  )
  .unwrap();
  super::CachedTodoClient::new(inner, std::time::Duration::from_secs(300))
}
