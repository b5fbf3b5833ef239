//! Authenticated request wrapper: bearer token in, forced logout on 401.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::error::{ApiError, Operation};
use crate::session::TokenStore;

/// Receives the forced navigation to the login entry point.
///
/// Implementations must leave every authenticated view behind: a full
/// navigation, not a soft transition within the current screen.
pub trait Navigator: Send + Sync {
  fn force_login(&self);
}

/// Wraps outbound calls that need a session.
#[derive(Clone)]
pub struct AuthenticatedClient {
  http: reqwest::Client,
  tokens: Arc<TokenStore>,
  navigator: Arc<dyn Navigator>,
}

impl AuthenticatedClient {
  pub fn new(http: reqwest::Client, tokens: Arc<TokenStore>, navigator: Arc<dyn Navigator>) -> Self {
    Self {
      http,
      tokens,
      navigator,
    }
  }

  /// Start building a request on the shared HTTP client.
  pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
    self.http.request(method, url)
  }

  /// Send `request` exactly once.
  ///
  /// Attaches `Authorization: Bearer <token>` when a session exists. A 401
  /// tears the session down and returns `ApiError::Unauthorized`; any other
  /// status is handed back untouched for the caller to interpret.
  pub async fn send(&self, op: Operation, request: RequestBuilder) -> Result<Response, ApiError> {
    let token = self.tokens.get();
    let request = match &token {
      Some(token) => request.bearer_auth(token),
      None => request,
    };

    let response = request
      .send()
      .await
      .map_err(|e| ApiError::network(op, &e))?;

    if response.status() == StatusCode::UNAUTHORIZED {
      self.handle_unauthorized(op, token.as_deref());
      return Err(ApiError::Unauthorized);
    }

    debug!("{} -> {}", op, response.status());
    Ok(response)
  }

  /// Discard the session the rejected request was sent with and force the
  /// login view. Concurrent 401s for one session tear it down once, and a
  /// 401 that lands after a newer login leaves that login alone.
  fn handle_unauthorized(&self, op: Operation, sent_with: Option<&str>) {
    let teardown = self.tokens.clear_if_current(sent_with);

    if teardown {
      warn!("Session rejected while trying to {}; logging out", op);
      self.navigator.force_login();
    } else {
      debug!("Session already torn down; ignoring 401 for {}", op);
    }
  }
}
