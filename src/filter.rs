//! Client-side list filtering and per-filter counts.

use crate::api::Todo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TodoFilter {
  #[default]
  All,
  Active,
  Completed,
}

impl TodoFilter {
  pub const ALL: [TodoFilter; 3] = [TodoFilter::All, TodoFilter::Active, TodoFilter::Completed];

  pub fn matches(self, todo: &Todo) -> bool {
    match self {
      TodoFilter::All => true,
      TodoFilter::Active => !todo.completed,
      TodoFilter::Completed => todo.completed,
    }
  }

  pub fn apply(self, todos: &[Todo]) -> Vec<&Todo> {
    todos.iter().filter(|t| self.matches(t)).collect()
  }

  pub fn label(self) -> &'static str {
    match self {
      TodoFilter::All => "all",
      TodoFilter::Active => "active",
      TodoFilter::Completed => "completed",
    }
  }

  pub fn next(self) -> Self {
    match self {
      TodoFilter::All => TodoFilter::Active,
      TodoFilter::Active => TodoFilter::Completed,
      TodoFilter::Completed => TodoFilter::All,
    }
  }

  /// Heading shown when nothing matches.
  pub fn empty_title(self) -> &'static str {
    match self {
      TodoFilter::All => "No todos yet",
      TodoFilter::Active => "No active todos",
      TodoFilter::Completed => "No completed todos",
    }
  }

  pub fn empty_hint(self) -> &'static str {
    match self {
      TodoFilter::All => "Get started by creating a new todo.",
      TodoFilter::Active => "All your todos are completed!",
      TodoFilter::Completed => "Complete some todos to see them here.",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoStats {
  pub total: usize,
  pub active: usize,
  pub completed: usize,
}

impl TodoStats {
  pub fn of(todos: &[Todo]) -> Self {
    let completed = todos.iter().filter(|t| t.completed).count();
    Self {
      total: todos.len(),
      active: todos.len() - completed,
      completed,
    }
  }

  pub fn count(&self, filter: TodoFilter) -> usize {
    match filter {
      TodoFilter::All => self.total,
      TodoFilter::Active => self.active,
      TodoFilter::Completed => self.completed,
    }
  }
}
