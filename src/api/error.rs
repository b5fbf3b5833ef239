use std::fmt;
use thiserror::Error;

/// The API call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Login,
  Fetch,
  Create,
  Update,
  Delete,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let action = match self {
      Operation::Login => "log in",
      Operation::Fetch => "fetch todos",
      Operation::Create => "create todo",
      Operation::Update => "update todo",
      Operation::Delete => "delete todo",
    };
    f.write_str(action)
  }
}

/// Errors surfaced by the to-do API client.
///
/// The UI only needs the message; `Unauthorized` is the one variant with a
/// side effect already applied (session cleared, login forced).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// Bad credentials at login
  #[error("Login failed")]
  Authentication,

  /// 401 on an authenticated call
  #[error("Unauthorized access - please log in again")]
  Unauthorized,

  /// Non-2xx status other than 401
  #[error("Failed to {op} (HTTP {status})")]
  RequestFailed { op: Operation, status: u16 },

  /// Transport failure before a response arrived
  #[error("Failed to {op}: {message}")]
  Network { op: Operation, message: String },

  /// Response body did not match the expected shape
  #[error("Failed to {op}: unexpected response ({message})")]
  Decode { op: Operation, message: String },

  /// Input rejected before any request was made
  #[error("{0}")]
  Validation(String),
}

impl ApiError {
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, ApiError::Unauthorized)
  }

  pub(super) fn network(op: Operation, error: &reqwest::Error) -> Self {
    ApiError::Network {
      op,
      message: error.to_string(),
    }
  }

  pub(super) fn decode(op: Operation, error: impl fmt::Display) -> Self {
    ApiError::Decode {
      op,
      message: error.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages() {
    assert_eq!(ApiError::Authentication.to_string(), "Login failed");
    assert_eq!(
      ApiError::RequestFailed {
        op: Operation::Fetch,
        status: 500
      }
      .to_string(),
      "Failed to fetch todos (HTTP 500)"
    );
    assert_eq!(
      ApiError::RequestFailed {
        op: Operation::Delete,
        status: 404
      }
      .to_string(),
      "Failed to delete todo (HTTP 404)"
    );
  }
}
