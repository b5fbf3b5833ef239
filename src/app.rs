use crate::api::CachedTodoClient;
use crate::event::{Event, EventHandler};
use crate::session::{gate, Route, TokenStore};
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{DashboardView, LoginView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Main application state
pub struct App {
  /// The one live view; navigation replaces it
  view: Box<dyn View>,

  /// Route of the live view, after the session gate
  route: Route,

  /// Cached to-do client shared with every view
  client: CachedTodoClient,

  tokens: Arc<TokenStore>,

  api_url: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(client: CachedTodoClient) -> Self {
    let tokens = client.client().tokens().clone();
    let api_url = client.client().base_url().to_string();
    let route = gate::resolve(Route::Index, &tokens);
    let view = Self::build_view(route, &client);

    Self {
      view,
      route,
      client,
      tokens,
      api_url,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    events.start(Duration::from_millis(250));

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        let action = self.view.tick();
        self.apply(action);
      }
      Event::Navigate(route) => {
        // Forced by the session interceptor: nothing cached may outlive the session
        info!("Session ended; navigating to {}", route.label());
        self.client.clear_cache();
        // Already there: keep whatever the user has typed
        if gate::resolve(route, &self.tokens) != self.route {
          self.navigate(route);
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }
    let action = self.view.handle_key(key);
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Navigate(route) => self.navigate(route),
      ViewAction::Quit => self.should_quit = true,
    }
  }

  /// Replace the live view with the one the session gate allows for `requested`
  fn navigate(&mut self, requested: Route) {
    let route = gate::resolve(requested, &self.tokens);
    debug!(
      "Navigate {} -> {} (resolved {})",
      self.route.label(),
      requested.label(),
      route.label()
    );
    self.view = Self::build_view(route, &self.client);
    self.route = route;
  }

  fn build_view(route: Route, client: &CachedTodoClient) -> Box<dyn View> {
    match route {
      Route::Dashboard => Box::new(DashboardView::new(client.clone())),
      // The gate never resolves to the index route
      Route::Index | Route::Login => Box::new(LoginView::new(client.clone())),
    }
  }

  pub fn view_mut(&mut self) -> &mut dyn View {
    self.view.as_mut()
  }

  pub fn route(&self) -> Route {
    self.route
  }

  pub fn api_url(&self) -> &str {
    &self.api_url
  }

  pub fn is_authenticated(&self) -> bool {
    self.tokens.is_authenticated()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    vec![self.route().label().to_string(), self.view.breadcrumb_label()]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_support::{cached_client, FakeTodoApi, PASSWORD, USERNAME};
  use crate::api::Credentials;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn test_starts_on_login_without_session() {
    let (server, _api) = FakeTodoApi::start().await;
    let app = App::new(cached_client(&server.uri()));
    assert_eq!(app.route(), Route::Login);
    assert!(!app.is_authenticated());
  }

  #[tokio::test]
  async fn test_starts_on_dashboard_with_session() {
    let (server, _api) = FakeTodoApi::start().await;
    let client = cached_client(&server.uri());
    client
      .login(&Credentials::new(USERNAME, PASSWORD))
      .await
      .unwrap();

    let app = App::new(client);
    assert_eq!(app.route(), Route::Dashboard);
    assert_eq!(app.breadcrumb()[0], "/dashboard");
  }

  #[tokio::test]
  async fn test_gate_redirects_dashboard_to_login() {
    let (server, _api) = FakeTodoApi::start().await;
    let mut app = App::new(cached_client(&server.uri()));

    app.navigate(Route::Dashboard);
    assert_eq!(app.route(), Route::Login);
  }

  #[tokio::test]
  async fn test_forced_navigation_clears_cache() {
    let (server, api) = FakeTodoApi::start().await;
    api.seed("Buy milk", "");
    let client = cached_client(&server.uri());
    client
      .login(&Credentials::new(USERNAME, PASSWORD))
      .await
      .unwrap();
    client.todos().await.unwrap();
    let mut app = App::new(client.clone());

    // Interceptor already cleared the token before signalling
    client.client().tokens().clear();
    app.handle_event(Event::Navigate(Route::Login));

    assert_eq!(app.route(), Route::Login);
    assert!(client.todos_snapshot().data.is_none());
  }

  #[tokio::test]
  async fn test_forced_navigation_keeps_open_login_view() {
    let (server, _api) = FakeTodoApi::start().await;
    let mut app = App::new(cached_client(&server.uri()));
    app.handle_event(Event::Key(key(KeyCode::Char('a'))));
    let before = app.view.as_ref() as *const dyn View as *const ();

    app.handle_event(Event::Navigate(Route::Login));

    let after = app.view.as_ref() as *const dyn View as *const ();
    assert_eq!(app.route(), Route::Login);
    assert_eq!(before, after);
  }

  #[tokio::test]
  async fn test_quit_keys() {
    let (server, _api) = FakeTodoApi::start().await;
    let mut app = App::new(cached_client(&server.uri()));

    app.handle_event(Event::Key(KeyEvent::new(
      KeyCode::Char('c'),
      KeyModifiers::CONTROL,
    )));
    assert!(app.should_quit);

    let mut app = App::new(cached_client(&server.uri()));
    app.handle_event(Event::Key(key(KeyCode::Esc)));
    assert!(app.should_quit);
  }
}
