use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::Navigator;
use crate::session::Route;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// Full navigation requested outside the current view
  Navigate(Route),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Sender for events produced by background tasks
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Spawn the terminal reader with the given tick rate
  pub fn start(&self, tick_rate: Duration) {
    let tx = self.tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          _ => continue,
        }
      } else {
        Event::Tick
      };

      if tx.send(event).is_err() {
        break;
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Default for EventHandler {
  fn default() -> Self {
    Self::new()
  }
}

/// Delivers the session interceptor's forced logout to the event loop.
pub struct EventNavigator {
  tx: mpsc::UnboundedSender<Event>,
}

impl EventNavigator {
  pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
    Self { tx }
  }
}

impl Navigator for EventNavigator {
  fn force_login(&self) {
    // The loop is gone only during shutdown, when there is nothing to show
    let _ = self.tx.send(Event::Navigate(Route::Login));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_navigator_sends_login_navigation() {
    let mut events = EventHandler::new();
    let navigator = EventNavigator::new(events.sender());

    navigator.force_login();

    assert!(matches!(
      events.next().await,
      Some(Event::Navigate(Route::Login))
    ));
  }
}
