use crate::api::{ApiError, CachedTodoClient, Todo, TodoCreate, TodoListObserver, TodoUpdate};
use crate::filter::{TodoFilter, TodoStats};
use crate::session::Route;
use crate::ui::components::{FormEvent, KeyResult, TodoForm};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{checkbox, todo_style, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use tokio::sync::mpsc;
use tracing::warn;

/// What the open form will do on submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormTarget {
  Create,
  Edit(i64),
}

enum Mode {
  Normal,
  Form(TodoForm, FormTarget),
  ConfirmDelete { id: i64, title: String },
}

/// Outcome of a background mutation, reported back on tick
type MutationResult = Result<&'static str, ApiError>;

/// The signed-in user's to-do list
pub struct DashboardView {
  client: CachedTodoClient,
  todos: TodoListObserver,
  filter: TodoFilter,
  list_state: ListState,
  mode: Mode,
  status: Option<String>,
  pending: usize,
  results_tx: mpsc::UnboundedSender<MutationResult>,
  results_rx: mpsc::UnboundedReceiver<MutationResult>,
}

impl DashboardView {
  pub fn new(client: CachedTodoClient) -> Self {
    let todos = client.subscribe_todos();
    client.prefetch_todos();
    let (results_tx, results_rx) = mpsc::unbounded_channel();

    Self {
      client,
      todos,
      filter: TodoFilter::default(),
      list_state: ListState::default().with_selected(Some(0)),
      mode: Mode::Normal,
      status: None,
      pending: 0,
      results_tx,
      results_rx,
    }
  }

  fn all_todos(&self) -> &[Todo] {
    self.todos.snapshot().data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn visible(&self) -> Vec<&Todo> {
    self.filter.apply(self.all_todos())
  }

  fn selected(&self) -> Option<Todo> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).map(|t| (*t).clone())
  }

  fn set_filter(&mut self, filter: TodoFilter) {
    self.filter = filter;
    self.list_state.select(Some(0));
  }

  fn refetch(&mut self) {
    let client = self.client.clone();
    tokio::spawn(async move {
      // The observer carries the outcome
      let _ = client.refetch_todos().await;
    });
  }

  /// Run a mutation in the background; its result comes back through `tick`
  fn spawn_mutation<F>(&mut self, success: &'static str, mutation: F)
  where
    F: std::future::Future<Output = Result<(), ApiError>> + Send + 'static,
  {
    self.pending += 1;
    self.status = None;
    let tx = self.results_tx.clone();
    tokio::spawn(async move {
      let _ = tx.send(mutation.await.map(|_| success));
    });
  }

  fn submit_form(&mut self, target: FormTarget, title: String, description: String) -> bool {
    let client = self.client.clone();
    match target {
      FormTarget::Create => match TodoCreate::new(title, description).validated() {
        Ok(todo) => {
          self.spawn_mutation("Todo added", async move {
            client.create_todo(&todo).await.map(|_| ())
          });
          true
        }
        Err(e) => {
          self.status = Some(e.to_string());
          false
        }
      },
      FormTarget::Edit(id) => match TodoUpdate::edit(title, description).validated() {
        Ok(update) => {
          self.spawn_mutation("Todo saved", async move {
            client.update_todo(id, &update).await.map(|_| ())
          });
          true
        }
        Err(e) => {
          self.status = Some(e.to_string());
          false
        }
      },
    }
  }

  fn toggle_selected(&mut self) {
    if let Some(todo) = self.selected() {
      let client = self.client.clone();
      let message = if todo.completed {
        "Marked as active"
      } else {
        "Marked as completed"
      };
      self.spawn_mutation(message, async move {
        client.toggle_todo(&todo).await.map(|_| ())
      });
    }
  }

  fn handle_normal_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),
      KeyCode::Tab => self.set_filter(self.filter.next()),
      KeyCode::Char('1') => self.set_filter(TodoFilter::All),
      KeyCode::Char('2') => self.set_filter(TodoFilter::Active),
      KeyCode::Char('3') => self.set_filter(TodoFilter::Completed),
      KeyCode::Char('a') => {
        self.status = None;
        self.mode = Mode::Form(TodoForm::add(), FormTarget::Create);
      }
      KeyCode::Char('e') | KeyCode::Enter => {
        if let Some(todo) = self.selected() {
          self.status = None;
          self.mode = Mode::Form(
            TodoForm::edit(&todo.title, &todo.description),
            FormTarget::Edit(todo.id),
          );
        }
      }
      KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected(),
      KeyCode::Char('d') | KeyCode::Delete => {
        if let Some(todo) = self.selected() {
          self.mode = Mode::ConfirmDelete {
            id: todo.id,
            title: todo.title,
          };
        }
      }
      KeyCode::Char('r') => {
        self.status = None;
        self.refetch();
      }
      KeyCode::Char('L') => {
        self.client.logout();
        return ViewAction::Navigate(Route::Login);
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Quit,
      _ => {}
    }
    ViewAction::None
  }

  fn render_tabs(&self, frame: &mut Frame, area: Rect) {
    let stats = TodoStats::of(self.all_todos());
    let titles: Vec<Line> = TodoFilter::ALL
      .iter()
      .map(|f| Line::from(format!(" {} ({}) ", f.label(), stats.count(*f))))
      .collect();
    let selected = TodoFilter::ALL
      .iter()
      .position(|f| *f == self.filter)
      .unwrap_or(0);

    let tabs = Tabs::new(titles)
      .select(selected)
      .style(Style::default().fg(Color::DarkGray))
      .highlight_style(Style::default().fg(Color::Blue).bold().underlined())
      .divider("│");
    frame.render_widget(tabs, area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.todos.snapshot();
    let refreshing = snapshot.is_loading() && snapshot.data().is_some();
    let title = if refreshing || self.pending > 0 {
      " My Todos (syncing...) ".to_string()
    } else {
      format!(" My Todos ({}) ", self.all_todos().len())
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if snapshot.is_initial_load() {
      let paragraph = Paragraph::new("Loading todos...")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    if let (Some(error), None) = (snapshot.error(), snapshot.data()) {
      let text = vec![
        Line::styled("Error loading todos", Style::default().fg(Color::Red).bold()),
        Line::styled(error.to_string(), Style::default().fg(Color::Red)),
        Line::raw(""),
        Line::styled("Press 'r' to try again.", Style::default().fg(Color::DarkGray)),
      ];
      let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
      frame.render_widget(paragraph, area);
      return;
    }

    let visible = self.visible();
    if visible.is_empty() {
      let text = vec![
        Line::styled(self.filter.empty_title(), Style::default().bold()),
        Line::styled(self.filter.empty_hint(), Style::default().fg(Color::DarkGray)),
      ];
      let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);
      frame.render_widget(paragraph, area);
      return;
    }

    let text_width = area.width.saturating_sub(24) as usize;
    let items: Vec<ListItem> = visible
      .iter()
      .map(|todo| {
        let style = todo_style(todo.completed);
        let mut lines = vec![Line::from(vec![
          checkbox(todo.completed),
          Span::raw(" "),
          Span::styled(truncate(&todo.title, text_width), style.bold()),
          Span::styled(dates(todo), Style::default().fg(Color::DarkGray)),
        ])];
        if !todo.description.is_empty() {
          lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(truncate(&todo.description, text_width), style),
          ]));
        }
        ListItem::new(lines)
      })
      .collect();
    let len = items.len();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    ensure_valid_selection(&mut self.list_state, len);
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_confirm(&self, frame: &mut Frame, area: Rect, title: &str) {
    let width = area.width.saturating_sub(8).min(60);
    let popup = Rect {
      x: area.x + area.width.saturating_sub(width) / 2,
      y: area.y + area.height.saturating_sub(5) / 2,
      width,
      height: 5.min(area.height),
    };

    let text = vec![
      Line::raw("Are you sure you want to delete this todo?"),
      Line::styled(truncate(title, width.saturating_sub(4) as usize), Style::default().bold()),
      Line::styled("y: delete   n: cancel", Style::default().fg(Color::DarkGray)),
    ];
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
      Block::default()
        .title(" Delete ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red)),
    );
    frame.render_widget(ratatui::widgets::Clear, popup);
    frame.render_widget(paragraph, popup);
  }
}

/// Creation date, plus the edit date once the item has changed
fn dates(todo: &Todo) -> String {
  let created = todo.created_at.format("%Y-%m-%d");
  if todo.last_updated() > todo.created_at {
    format!("  {} (edited {})", created, todo.last_updated().format("%Y-%m-%d"))
  } else {
    format!("  {}", created)
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match &mut self.mode {
      Mode::Normal => self.handle_normal_key(key),
      Mode::Form(form, target) => {
        let target = *target;
        match form.handle_key(key) {
          KeyResult::Event(FormEvent::Submitted { title, description }) => {
            if self.submit_form(target, title, description) {
              self.mode = Mode::Normal;
            }
          }
          KeyResult::Event(FormEvent::Cancelled) => self.mode = Mode::Normal,
          KeyResult::Handled | KeyResult::NotHandled => {}
        }
        ViewAction::None
      }
      Mode::ConfirmDelete { id, .. } => {
        let id = *id;
        match key.code {
          KeyCode::Char('y') | KeyCode::Char('Y') => {
            self.mode = Mode::Normal;
            let client = self.client.clone();
            self.spawn_mutation("Todo deleted", async move { client.delete_todo(id).await });
          }
          KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.mode = Mode::Normal,
          _ => {}
        }
        ViewAction::None
      }
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Filter tabs
        Constraint::Min(3),    // List
      ])
      .split(area);

    self.render_tabs(frame, chunks[0]);
    self.render_list(frame, chunks[1]);

    match &self.mode {
      Mode::Form(form, _) => form.render_overlay(frame, chunks[1]),
      Mode::ConfirmDelete { title, .. } => self.render_confirm(frame, chunks[1], title),
      Mode::Normal => {}
    }
  }

  fn breadcrumb_label(&self) -> String {
    format!("Dashboard [{}]", self.filter.label())
  }

  fn tick(&mut self) -> ViewAction {
    self.todos.poll();

    while let Ok(result) = self.results_rx.try_recv() {
      self.pending = self.pending.saturating_sub(1);
      match result {
        Ok(message) => self.status = Some(message.to_string()),
        // A 401 has already cleared the session and queued the forced navigation
        Err(ApiError::Unauthorized) => {}
        Err(e) => {
          warn!("Mutation failed: {}", e);
          self.status = Some(e.to_string());
        }
      }
    }
    ViewAction::None
  }

  fn status(&self) -> Option<String> {
    if self.pending > 0 {
      return Some("Saving...".to_string());
    }
    self.status.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    match self.mode {
      Mode::Normal => vec![
        ShortcutInfo::new("a", "add").with_priority(10),
        ShortcutInfo::new("e", "edit").with_priority(20),
        ShortcutInfo::new("x", "toggle").with_priority(30),
        ShortcutInfo::new("d", "delete").with_priority(40),
        ShortcutInfo::new("tab", "filter").with_priority(50),
        ShortcutInfo::new("r", "refresh").with_priority(60),
        ShortcutInfo::new("L", "logout").with_priority(70),
        ShortcutInfo::new("q", "quit").with_priority(80),
      ],
      Mode::Form(..) => vec![
        ShortcutInfo::new("enter", "save").with_priority(10),
        ShortcutInfo::new("esc", "cancel").with_priority(20),
      ],
      Mode::ConfirmDelete { .. } => vec![
        ShortcutInfo::new("y", "delete").with_priority(10),
        ShortcutInfo::new("n", "cancel").with_priority(20),
      ],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_support::{cached_client, FakeTodoApi, PASSWORD, USERNAME};
  use crate::api::Credentials;
  use crossterm::event::KeyModifiers;
  use std::time::Duration;
  use wiremock::MockServer;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn press(view: &mut DashboardView, keys: &str) {
    for c in keys.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  async fn signed_in() -> (MockServer, FakeTodoApi, CachedTodoClient) {
    let (server, api) = FakeTodoApi::start().await;
    let client = cached_client(&server.uri());
    client
      .login(&Credentials::new(USERNAME, PASSWORD))
      .await
      .unwrap();
    (server, api, client)
  }

  /// Tick until `done` holds
  async fn wait_for(view: &mut DashboardView, done: impl Fn(&DashboardView) -> bool) {
    for _ in 0..200 {
      view.tick();
      if done(view) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dashboard did not reach the expected state");
  }

  fn is_editing(view: &DashboardView) -> bool {
    matches!(view.mode, Mode::Form(..))
  }

  fn titles(view: &DashboardView) -> Vec<String> {
    view.visible().iter().map(|t| t.title.clone()).collect()
  }

  #[test]
  fn test_dates_mention_edits() {
    let mut todo: Todo = serde_json::from_value(crate::api::test_support::todo_json(1, "a", "", false)).unwrap();
    assert_eq!(dates(&todo), "  2024-06-01");

    todo.updated_at = Some(todo.created_at + chrono::Duration::days(2));
    assert_eq!(dates(&todo), "  2024-06-01 (edited 2024-06-03)");
  }

  #[tokio::test]
  async fn test_opening_loads_the_list() {
    let (_server, api, client) = signed_in().await;
    api.seed("Buy milk", "");
    let mut view = DashboardView::new(client);

    wait_for(&mut view, |v| v.todos.snapshot().data().is_some()).await;
    assert_eq!(titles(&view), vec!["Buy milk"]);
  }

  #[tokio::test]
  async fn test_add_form_creates_todo() {
    let (_server, _api, client) = signed_in().await;
    let mut view = DashboardView::new(client);
    wait_for(&mut view, |v| v.todos.snapshot().data().is_some()).await;

    press(&mut view, "a");
    assert!(is_editing(&view));
    press(&mut view, "Write report");
    view.handle_key(key(KeyCode::Enter));
    view.handle_key(key(KeyCode::Enter));
    assert!(!is_editing(&view));

    wait_for(&mut view, |v| titles(v) == vec!["Write report"] && v.pending == 0).await;
    assert_eq!(view.status().as_deref(), Some("Todo added"));
  }

  #[tokio::test]
  async fn test_toggle_moves_item_between_filters() {
    let (_server, api, client) = signed_in().await;
    api.seed("Buy milk", "");
    let mut view = DashboardView::new(client);
    wait_for(&mut view, |v| !v.all_todos().is_empty()).await;

    press(&mut view, "x");
    wait_for(&mut view, |v| v.all_todos().iter().all(|t| t.completed)).await;

    press(&mut view, "2");
    assert!(view.visible().is_empty());
    press(&mut view, "3");
    assert_eq!(titles(&view), vec!["Buy milk"]);
  }

  #[tokio::test]
  async fn test_delete_requires_confirmation() {
    let (_server, api, client) = signed_in().await;
    api.seed("Old task", "");
    let mut view = DashboardView::new(client);
    wait_for(&mut view, |v| !v.all_todos().is_empty()).await;

    press(&mut view, "dn");
    assert!(matches!(view.mode, Mode::Normal));
    assert_eq!(view.all_todos().len(), 1);

    press(&mut view, "dy");
    wait_for(&mut view, |v| v.all_todos().is_empty() && v.pending == 0).await;
  }

  #[tokio::test]
  async fn test_edit_updates_title() {
    let (_server, api, client) = signed_in().await;
    api.seed("Draft", "notes");
    let mut view = DashboardView::new(client);
    wait_for(&mut view, |v| !v.all_todos().is_empty()).await;

    press(&mut view, "e");
    press(&mut view, " v2");
    view.handle_key(key(KeyCode::Tab));
    view.handle_key(key(KeyCode::Enter));

    wait_for(&mut view, |v| titles(v) == vec!["Draft v2"]).await;
    assert_eq!(view.all_todos()[0].description, "notes");
  }

  #[tokio::test]
  async fn test_invalid_title_keeps_form_open() {
    let (_server, _api, client) = signed_in().await;
    let mut view = DashboardView::new(client);

    press(&mut view, "a");
    press(&mut view, &"x".repeat(201));
    view.handle_key(key(KeyCode::Enter));
    view.handle_key(key(KeyCode::Enter));

    assert!(is_editing(&view));
    assert!(view.status().is_some());
  }

  #[tokio::test]
  async fn test_logout_navigates_to_login() {
    let (_server, _api, client) = signed_in().await;
    let mut view = DashboardView::new(client.clone());

    assert_eq!(
      view.handle_key(key(KeyCode::Char('L'))),
      ViewAction::Navigate(Route::Login)
    );
    assert!(!client.client().tokens().is_authenticated());
  }
}
