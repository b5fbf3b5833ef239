//! Title + description form used for adding and editing to-dos.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::input::{InputResult, TextInput};
use super::key_result::KeyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Title,
  Description,
}

/// Events the form reports to its view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  Submitted { title: String, description: String },
  Cancelled,
}

#[derive(Debug)]
pub struct TodoForm {
  heading: &'static str,
  title: TextInput,
  description: TextInput,
  focus: Field,
}

impl TodoForm {
  pub fn add() -> Self {
    Self {
      heading: " Add New Todo ",
      title: TextInput::new(),
      description: TextInput::new(),
      focus: Field::Title,
    }
  }

  pub fn edit(title: &str, description: &str) -> Self {
    Self {
      heading: " Edit Todo ",
      title: TextInput::with_value(title),
      description: TextInput::with_value(description),
      focus: Field::Title,
    }
  }

  /// Tab/Up/Down switch fields; Enter on the title moves on, Enter on the
  /// description submits. A blank title is not submitted.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
        self.focus = match self.focus {
          Field::Title => Field::Description,
          Field::Description => Field::Title,
        };
        return KeyResult::Handled;
      }
      _ => {}
    }

    let input = match self.focus {
      Field::Title => &mut self.title,
      Field::Description => &mut self.description,
    };

    match input.handle_key(key) {
      InputResult::Consumed => KeyResult::Handled,
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Submitted(_) if self.focus == Field::Title => {
        self.focus = Field::Description;
        KeyResult::Handled
      }
      InputResult::Submitted(_) => {
        if self.title.value().trim().is_empty() {
          self.focus = Field::Title;
          return KeyResult::Handled;
        }
        KeyResult::Event(FormEvent::Submitted {
          title: self.title.value(),
          description: self.description.value(),
        })
      }
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Render as a centered overlay
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let width = area.width.saturating_sub(8).min(70);
    let popup = Rect {
      x: area.x + (area.width.saturating_sub(width)) / 2,
      y: area.y + area.height.saturating_sub(8) / 2,
      width,
      height: 8.min(area.height),
    };

    frame.render_widget(Clear, popup);
    let block = Block::default()
      .title(self.heading)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Title label
        Constraint::Length(1), // Title input
        Constraint::Length(1), // Description label
        Constraint::Length(1), // Description input
        Constraint::Min(0),
        Constraint::Length(1), // Hint
      ])
      .split(inner);

    let field_style = |field: Field| {
      if self.focus == field {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      }
    };

    frame.render_widget(Paragraph::new("Title").style(field_style(Field::Title)), rows[0]);
    frame.render_widget(Paragraph::new(self.title.display()), rows[1]);
    frame.render_widget(
      Paragraph::new("Description").style(field_style(Field::Description)),
      rows[2],
    );
    frame.render_widget(Paragraph::new(self.description.display()), rows[3]);
    frame.render_widget(
      Paragraph::new("Tab: switch field  Enter: next/save  Esc: cancel")
        .style(Style::default().fg(Color::DarkGray)),
      rows[5],
    );

    let (row, input) = match self.focus {
      Field::Title => (rows[1], &self.title),
      Field::Description => (rows[3], &self.description),
    };
    let column = (input.cursor_position() as u16).min(row.width.saturating_sub(1));
    frame.set_cursor_position(Position::new(row.x + column, row.y));
  }
}
