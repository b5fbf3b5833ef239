//! Cache identities for to-do queries.

use crate::cache::QueryKey;

/// Query key types for to-do API reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TodoQueryKey {
  /// The full to-do list of the current user
  List,
}

impl QueryKey for TodoQueryKey {
  fn cache_key(&self) -> String {
    match self {
      Self::List => "todos:list".to_string(),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::List => "todo list".to_string(),
    }
  }
}
