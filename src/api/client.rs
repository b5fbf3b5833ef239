use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::error::{ApiError, Operation};
use super::http::{AuthenticatedClient, Navigator};
use super::types::{AuthToken, Credentials, Todo, TodoCreate, TodoUpdate};
use crate::session::TokenStore;

/// Typed operations on the to-do API.
#[derive(Clone)]
pub struct TodoClient {
  base_url: Url,
  http: reqwest::Client,
  authed: AuthenticatedClient,
  tokens: Arc<TokenStore>,
}

impl TodoClient {
  pub fn new(
    base_url: &str,
    timeout: Duration,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
  ) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API URL {}: {}", base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API URL {}: not a base URL", base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let authed = AuthenticatedClient::new(http.clone(), tokens.clone(), navigator);

    Ok(Self {
      base_url,
      http,
      authed,
      tokens,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  pub fn tokens(&self) -> &Arc<TokenStore> {
    &self.tokens
  }

  /// Exchange credentials for a token and store it.
  ///
  /// Goes straight to the network: a 401 here means bad credentials, not an
  /// expired session, so it must not trip the session interceptor.
  pub async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
    let op = Operation::Login;
    let response = self
      .http
      .post(self.endpoint(&["login"]))
      .json(credentials)
      .send()
      .await
      .map_err(|e| ApiError::network(op, &e))?;

    if !response.status().is_success() {
      warn!(
        "Login failed for {} (HTTP {})",
        credentials.username,
        response.status()
      );
      return Err(ApiError::Authentication);
    }

    let token: AuthToken = read_json(op, response).await?;
    if token.access_token.is_empty() {
      return Err(ApiError::decode(op, "empty access token"));
    }

    self.tokens.set(&token.access_token);
    info!("Logged in as {}", credentials.username);
    Ok(token)
  }

  /// Forget the session. Never touches the network.
  pub fn logout(&self) {
    self.tokens.clear();
    info!("Logged out");
  }

  /// All of the user's to-dos, in server order.
  pub async fn list_todos(&self) -> Result<Vec<Todo>, ApiError> {
    let op = Operation::Fetch;
    let request = self.authed.request(Method::GET, self.endpoint(&["todos"]));
    let response = self.checked(op, self.authed.send(op, request).await?)?;
    read_json(op, response).await
  }

  pub async fn create_todo(&self, todo: &TodoCreate) -> Result<Todo, ApiError> {
    let op = Operation::Create;
    let todo = todo.clone().validated()?;
    let request = self
      .authed
      .request(Method::POST, self.endpoint(&["todos"]))
      .json(&todo);
    let response = self.checked(op, self.authed.send(op, request).await?)?;
    read_json(op, response).await
  }

  pub async fn update_todo(&self, id: i64, update: &TodoUpdate) -> Result<Todo, ApiError> {
    let op = Operation::Update;
    let update = update.clone().validated()?;
    let request = self
      .authed
      .request(Method::PUT, self.todo_endpoint(id))
      .json(&update);
    let response = self.checked(op, self.authed.send(op, request).await?)?;
    read_json(op, response).await
  }

  pub async fn delete_todo(&self, id: i64) -> Result<(), ApiError> {
    let op = Operation::Delete;
    let request = self.authed.request(Method::DELETE, self.todo_endpoint(id));
    self.checked(op, self.authed.send(op, request).await?)?;
    Ok(())
  }

  fn checked(&self, op: Operation, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
      Ok(response)
    } else {
      Err(ApiError::RequestFailed {
        op,
        status: status.as_u16(),
      })
    }
  }

  fn todo_endpoint(&self, id: i64) -> Url {
    self.endpoint(&["todos", &id.to_string()])
  }

  /// Append path segments to the base URL, keeping any base path.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    // Only fails for cannot-be-a-base URLs, rejected in `new`
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }
}

async fn read_json<T: DeserializeOwned>(op: Operation, response: Response) -> Result<T, ApiError> {
  response.json().await.map_err(|e| ApiError::decode(op, e))
}
