use crate::api::{ApiError, AuthToken, CachedTodoClient, Credentials};
use crate::session::Route;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::sync::oneshot;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Username,
  Password,
}

/// Sign-in form
pub struct LoginView {
  client: CachedTodoClient,
  username: TextInput,
  password: TextInput,
  focus: Field,
  error: Option<String>,
  pending: Option<oneshot::Receiver<Result<AuthToken, ApiError>>>,
}

impl LoginView {
  pub fn new(client: CachedTodoClient) -> Self {
    Self {
      client,
      username: TextInput::new(),
      password: TextInput::masked(),
      focus: Field::Username,
      error: None,
      pending: None,
    }
  }

  fn is_loading(&self) -> bool {
    self.pending.is_some()
  }

  fn submit(&mut self) {
    if self.is_loading() {
      return;
    }
    let username = self.username.value();
    let password = self.password.value();
    if username.trim().is_empty() || password.is_empty() {
      self.error = Some("Username and password are required".to_string());
      return;
    }

    self.error = None;
    let (tx, rx) = oneshot::channel();
    let client = self.client.clone();
    tokio::spawn(async move {
      let result = client.login(&Credentials::new(username, password)).await;
      let _ = tx.send(result);
    });
    self.pending = Some(rx);
  }

  fn focused_input(&mut self) -> &mut TextInput {
    match self.focus {
      Field::Username => &mut self.username,
      Field::Password => &mut self.password,
    }
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
        self.focus = match self.focus {
          Field::Username => Field::Password,
          Field::Password => Field::Username,
        };
        return ViewAction::None;
      }
      KeyCode::Esc => return ViewAction::Quit,
      _ => {}
    }

    // Fields are read-only while a sign-in is in flight
    if self.is_loading() && !key.modifiers.contains(KeyModifiers::CONTROL) {
      return ViewAction::None;
    }

    match self.focused_input().handle_key(key) {
      InputResult::Submitted(_) if self.focus == Field::Username => {
        self.focus = Field::Password;
      }
      InputResult::Submitted(_) => self.submit(),
      InputResult::Consumed => self.error = None,
      InputResult::Cancelled | InputResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let width = area.width.saturating_sub(4).min(50);
    let height = 11.min(area.height);
    let form_area = Rect {
      x: area.x + area.width.saturating_sub(width) / 2,
      y: area.y + area.height.saturating_sub(height) / 2,
      width,
      height,
    };

    let block = Block::default()
      .title(" Sign in to your account ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Username label
        Constraint::Length(1), // Username input
        Constraint::Length(1),
        Constraint::Length(1), // Password label
        Constraint::Length(1), // Password input
        Constraint::Length(1),
        Constraint::Length(1), // Error
        Constraint::Length(1), // Button
        Constraint::Min(0),
      ])
      .split(inner);

    let label_style = |field: Field| {
      if self.focus == field {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      }
    };

    frame.render_widget(
      Paragraph::new("Username").style(label_style(Field::Username)),
      rows[0],
    );
    frame.render_widget(Paragraph::new(self.username.display()), rows[1]);
    frame.render_widget(
      Paragraph::new("Password").style(label_style(Field::Password)),
      rows[3],
    );
    frame.render_widget(Paragraph::new(self.password.display()), rows[4]);

    if let Some(error) = &self.error {
      frame.render_widget(
        Paragraph::new(error.as_str())
          .alignment(Alignment::Center)
          .style(Style::default().fg(Color::Red)),
        rows[6],
      );
    }

    let button = if self.is_loading() {
      Paragraph::new("Signing in...").style(Style::default().fg(Color::DarkGray))
    } else {
      Paragraph::new("[ Sign in ]").style(Style::default().fg(Color::Blue).bold())
    };
    frame.render_widget(button.alignment(Alignment::Center), rows[7]);

    if !self.is_loading() {
      let (row, input) = match self.focus {
        Field::Username => (rows[1], &self.username),
        Field::Password => (rows[4], &self.password),
      };
      let column = (input.cursor_position() as u16).min(row.width.saturating_sub(1));
      frame.set_cursor_position(Position::new(row.x + column, row.y));
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Login".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    let Some(rx) = self.pending.as_mut() else {
      return ViewAction::None;
    };

    match rx.try_recv() {
      Err(oneshot::error::TryRecvError::Empty) => ViewAction::None,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.pending = None;
        self.error = Some(ApiError::Authentication.to_string());
        ViewAction::None
      }
      Ok(result) => {
        self.pending = None;
        match result {
          Ok(_) => {
            info!("Signed in as {}", self.username.value());
            self.password.clear();
            ViewAction::Navigate(Route::Dashboard)
          }
          Err(e) => {
            warn!("Sign-in failed: {}", e);
            self.error = Some(e.to_string());
            ViewAction::None
          }
        }
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(10),
      ShortcutInfo::new("enter", "sign in").with_priority(20),
      ShortcutInfo::new("esc", "quit").with_priority(30),
    ]
  }
}
