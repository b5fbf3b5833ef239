pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let authenticated = app.is_authenticated();
  let api_url = app.api_url().to_string();
  let breadcrumb = app.breadcrumb();
  let view = app.view_mut();

  renderfns::draw_header(frame, chunks[0], &api_url, authenticated, &view.shortcuts());
  view.render(frame, chunks[1]);
  let status = view.status();
  renderfns::draw_footer(frame, chunks[2], &breadcrumb, status.as_deref());
}

/// Keep a list selection inside `0..len`
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_selection_clamped_to_last_item() {
    let mut state = ListState::default().with_selected(Some(7));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));
  }

  #[test]
  fn test_selection_cleared_for_empty_list() {
    let mut state = ListState::default().with_selected(Some(0));
    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);

    ensure_valid_selection(&mut state, 2);
    assert_eq!(state.selected(), Some(0));
  }
}
