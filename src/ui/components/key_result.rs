/// What a component did with a key, as reported to the view that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed with nothing further to do
  Handled,
  /// Consumed, and the view must act on this event
  Event(T),
  /// Not consumed; the view may use the key itself
  NotHandled,
}
