//! Request and response bodies exchanged with the to-do API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::ApiError;

/// Longest accepted title, in characters, after trimming.
pub const MAX_TITLE_LEN: usize = 200;

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// A to-do item as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
  pub id: i64,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub completed: bool,
  #[serde(deserialize_with = "deserialize_timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
  /// Last modification time, falling back to creation time.
  pub fn last_updated(&self) -> DateTime<Utc> {
    self.updated_at.unwrap_or(self.created_at)
  }
}

/// Body of `POST /todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoCreate {
  pub title: String,
  pub description: String,
}

impl TodoCreate {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
    }
  }

  /// Trim and check fields against the server's limits.
  pub fn validated(self) -> Result<Self, ApiError> {
    Ok(Self {
      title: validate_title(&self.title)?,
      description: validate_description(self.description)?,
    })
  }
}

/// Body of `PUT /todos/{id}`. Absent fields are left unchanged by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodoUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed: Option<bool>,
}

impl TodoUpdate {
  /// Change only the completion flag.
  pub fn completed(completed: bool) -> Self {
    Self {
      completed: Some(completed),
      ..Self::default()
    }
  }

  /// Replace title and description, leaving completion untouched.
  pub fn edit(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: Some(title.into()),
      description: Some(description.into()),
      completed: None,
    }
  }

  pub fn validated(self) -> Result<Self, ApiError> {
    Ok(Self {
      title: self.title.as_deref().map(validate_title).transpose()?,
      description: self.description.map(validate_description).transpose()?,
      completed: self.completed,
    })
  }
}

/// Body of `POST /login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

impl Credentials {
  pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      username: username.into(),
      password: password.into(),
    }
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .finish_non_exhaustive()
  }
}

/// Successful `POST /login` response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthToken {
  pub access_token: String,
  pub token_type: String,
}

impl std::fmt::Debug for AuthToken {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AuthToken")
      .field("token_type", &self.token_type)
      .finish_non_exhaustive()
  }
}

fn validate_title(title: &str) -> Result<String, ApiError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(ApiError::Validation("Title cannot be empty".to_string()));
  }
  if title.chars().count() > MAX_TITLE_LEN {
    return Err(ApiError::Validation(format!(
      "Title must be less than {} characters",
      MAX_TITLE_LEN
    )));
  }
  Ok(title.to_string())
}

fn validate_description(description: String) -> Result<String, ApiError> {
  if description.chars().count() > MAX_DESCRIPTION_LEN {
    return Err(ApiError::Validation(format!(
      "Description must be less than {} characters",
      MAX_DESCRIPTION_LEN
    )));
  }
  Ok(description)
}

/// Parse RFC 3339 timestamps as well as naive ISO 8601 ones, which the
/// server emits without an offset and which are taken as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
    .or_else(|| {
      NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|dt| dt.and_utc())
    })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  parse_timestamp(&raw)
    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn deserialize_optional_timestamp<'de, D>(
  deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<String>::deserialize(deserializer)? {
    Some(raw) => parse_timestamp(&raw)
      .map(Some)
      .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
    None => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_todo_accepts_naive_timestamps() {
    let todo: Todo = serde_json::from_value(serde_json::json!({
      "id": 3,
      "title": "Buy milk",
      "description": "",
      "completed": false,
      "user_id": 1,
      "created_at": "2024-05-01T09:30:00.123456"
    }))
    .unwrap();

    assert_eq!(todo.id, 3);
    assert_eq!(todo.updated_at, None);
    assert_eq!(
      todo.last_updated(),
      Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap() + chrono::Duration::microseconds(123456)
    );
  }

  #[test]
  fn test_todo_accepts_rfc3339_and_missing_description() {
    let todo: Todo = serde_json::from_value(serde_json::json!({
      "id": 1,
      "title": "Write report",
      "completed": true,
      "created_at": "2024-05-01T09:30:00Z",
      "updated_at": "2024-05-02T10:00:00+02:00"
    }))
    .unwrap();

    assert_eq!(todo.description, "");
    assert_eq!(
      todo.last_updated(),
      Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()
    );
  }

  #[test]
  fn test_invalid_timestamp_is_rejected() {
    let result: Result<Todo, _> = serde_json::from_value(serde_json::json!({
      "id": 1,
      "title": "x",
      "created_at": "yesterday"
    }));
    assert!(result.is_err());
  }

  #[test]
  fn test_partial_update_omits_absent_fields() {
    let body = serde_json::to_value(TodoUpdate::completed(true)).unwrap();
    assert_eq!(body, serde_json::json!({ "completed": true }));

    let body = serde_json::to_value(TodoUpdate::edit("t", "d")).unwrap();
    assert_eq!(body, serde_json::json!({ "title": "t", "description": "d" }));
  }

  #[test]
  fn test_create_validation_trims_title() {
    let create = TodoCreate::new("  Buy milk  ", "2 litres").validated().unwrap();
    assert_eq!(create.title, "Buy milk");
    assert_eq!(create.description, "2 litres");
  }

  #[test]
  fn test_create_validation_rejects_blank_and_long_input() {
    assert_eq!(
      TodoCreate::new("   ", "").validated(),
      Err(ApiError::Validation("Title cannot be empty".to_string()))
    );
    assert!(TodoCreate::new("x".repeat(MAX_TITLE_LEN + 1), "")
      .validated()
      .is_err());
    assert!(TodoCreate::new("x".repeat(MAX_TITLE_LEN), "")
      .validated()
      .is_ok());
    assert!(TodoCreate::new("ok", "d".repeat(MAX_DESCRIPTION_LEN + 1))
      .validated()
      .is_err());
  }

  #[test]
  fn test_update_validation_only_checks_present_fields() {
    assert!(TodoUpdate::completed(false).validated().is_ok());
    assert!(TodoUpdate::edit("", "d").validated().is_err());
  }

  #[test]
  fn test_secrets_are_not_debug_printed() {
    let credentials = Credentials::new("alice", "hunter2");
    assert!(!format!("{:?}", credentials).contains("hunter2"));

    let token = AuthToken {
      access_token: "secret-token".into(),
      token_type: "bearer".into(),
    };
    assert!(!format!("{:?}", token).contains("secret-token"));
  }
}
