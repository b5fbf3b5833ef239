//! Navigation guards between the login and dashboard views.

use super::token_store::TokenStore;

/// Navigable entry points of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Entry route; always redirects
  Index,
  Login,
  Dashboard,
}

impl Route {
  pub fn label(self) -> &'static str {
    match self {
      Route::Index => "/",
      Route::Login => "/login",
      Route::Dashboard => "/dashboard",
    }
  }
}

/// Resolve the route actually entered when navigating to `requested`.
///
/// Checked once at navigation time. A token change while a view is open does
/// not move the user; only the 401 interceptor forces a navigation.
pub fn resolve(requested: Route, tokens: &TokenStore) -> Route {
  let authenticated = tokens.is_authenticated();
  match requested {
    Route::Dashboard if !authenticated => Route::Login,
    Route::Login if authenticated => Route::Dashboard,
    Route::Index if authenticated => Route::Dashboard,
    Route::Index => Route::Login,
    route => route,
  }
}
