use ratatui::prelude::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Text style for a to-do, dimmed and struck through once completed
pub fn todo_style(completed: bool) -> Style {
  if completed {
    Style::default()
      .fg(Color::DarkGray)
      .add_modifier(Modifier::CROSSED_OUT)
  } else {
    Style::default().fg(Color::White)
  }
}

/// Checkbox marker for a to-do
pub fn checkbox(completed: bool) -> Span<'static> {
  if completed {
    Span::styled("[x]", Style::default().fg(Color::Green).bold())
  } else {
    Span::styled("[ ]", Style::default().fg(Color::DarkGray))
  }
}
