use crate::session::Route;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  /// No action needed
  None,
  /// Replace the current view with the one for `Route`, via the session gate
  Navigate(Route),
  /// Leave the application
  Quit,
}

/// Trait for view behavior
///
/// Views handle their own input modes (forms, confirmations) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data asynchronously hold a cache observer or a result
/// channel and drain it in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick; background work that finished may request navigation
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// Transient message for the footer, such as a failed save
  fn status(&self) -> Option<String> {
    None
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![ShortcutInfo::new("ctrl-c", "quit").with_priority(90)]
  }
}
