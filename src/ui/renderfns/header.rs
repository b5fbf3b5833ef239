use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, API host, session state, and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  api_url: &str,
  authenticated: bool,
  shortcuts: &[ShortcutInfo],
) {
  let domain = extract_domain(api_url);

  let (session, session_style) = if authenticated {
    ("signed in", Style::default().fg(Color::Green).bold())
  } else {
    ("signed out", Style::default().fg(Color::Yellow).bold())
  };

  let mut spans = vec![
    Span::styled(" tudu ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", session), session_style),
    Span::raw(" "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  for shortcut in shortcuts {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract host (and port) from the API base URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(extract_domain("https://todo.example.com"), "todo.example.com");
    assert_eq!(extract_domain("https://api.example.com/v1/"), "api.example.com");
    assert_eq!(extract_domain("http://localhost:8000"), "localhost:8000");
  }
}
