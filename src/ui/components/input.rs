use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, continue input mode
  Consumed,
  /// Enter pressed, here's the submitted value
  Submitted(String),
  /// Escape pressed, input cancelled
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Single-line text input. The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  chars: Vec<char>,
  cursor: usize,
  masked: bool,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Input that renders every character as `*`
  pub fn masked() -> Self {
    Self {
      masked: true,
      ..Self::default()
    }
  }

  /// Input pre-filled with `value`, cursor at the end
  pub fn with_value(value: &str) -> Self {
    let chars: Vec<char> = value.chars().collect();
    Self {
      cursor: chars.len(),
      chars,
      masked: false,
    }
  }

  pub fn value(&self) -> String {
    self.chars.iter().collect()
  }

  /// Text to draw on screen
  pub fn display(&self) -> String {
    if self.masked {
      "*".repeat(self.chars.len())
    } else {
      self.value()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.chars.is_empty()
  }

  pub fn clear(&mut self) {
    self.chars.clear();
    self.cursor = 0;
  }

  /// Handle a key event, returning the result
  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted(self.value()),
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          self.chars.remove(self.cursor);
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.chars.len() {
          self.chars.remove(self.cursor);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        self.cursor = (self.cursor + 1).min(self.chars.len());
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.chars.len();
        InputResult::Consumed
      }
      KeyCode::Char('a') if ctrl => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('e') if ctrl => {
        self.cursor = self.chars.len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if ctrl => {
        // Clear line before cursor
        self.chars.drain(..self.cursor);
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('w') if ctrl => {
        // Delete word before cursor
        let mut start = self.cursor;
        while start > 0 && self.chars[start - 1] == ' ' {
          start -= 1;
        }
        while start > 0 && self.chars[start - 1] != ' ' {
          start -= 1;
        }
        self.chars.drain(start..self.cursor);
        self.cursor = start;
        InputResult::Consumed
      }
      KeyCode::Char(_) if ctrl => InputResult::NotHandled,
      KeyCode::Char(c) => {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }

  /// Cursor column for rendering
  pub fn cursor_position(&self) -> usize {
    self.cursor
  }
}
