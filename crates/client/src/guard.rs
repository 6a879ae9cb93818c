//! Navigation guard for the application's views.
//!
//! Every view requires a signed-in session except the login and register
//! screens. Unknown paths resolve to the not-found view, which also requires
//! a session.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::LOGIN_PATH;
use crate::session::SessionState;

const HOME_PATH: &str = "/home";

/// A view the application can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Route name.
    pub name: &'static str,
    /// Path pattern; `:segment` captures a parameter.
    pub pattern: &'static str,
    /// Page title.
    pub title: &'static str,
    /// Whether the view is reachable without a session.
    pub no_auth: bool,
}

const fn route(name: &'static str, pattern: &'static str, title: &'static str) -> Route {
    Route {
        name,
        pattern,
        title,
        no_auth: false,
    }
}

/// Known views, matched in order.
pub const ROUTES: &[Route] = &[
    route("Home", "/home", "Zdrink"),
    Route {
        no_auth: true,
        ..route("Login", "/login", "Sign in")
    },
    Route {
        no_auth: true,
        ..route("Register", "/register", "Register")
    },
    route("Shop", "/shop/:shopId", "Shop"),
    route("Menu", "/menu/:shopId", "Menu"),
    route("Product", "/product/:productId", "Product"),
    route("Cart", "/cart", "Cart"),
    route("OrderCreate", "/order/create", "Confirm order"),
    route("OrderDetail", "/order/:orderId", "Order"),
    route("Orders", "/orders", "My orders"),
    route("Profile", "/profile", "Profile"),
];

/// Fallback for paths no route matches.
pub const NOT_FOUND: Route = route("NotFound", "/:pathMatch(.*)*", "Page not found");

/// A path resolved to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: Route,
    /// Captured `:segment` values.
    pub params: BTreeMap<String, String>,
    /// Requested path including any query string.
    pub full_path: String,
}

/// Outcome of [`NavigationGuard::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Enter the view.
    Proceed(RouteMatch),
    /// Go to the login view instead.
    Redirect {
        /// Login location including the `redirect` query parameter.
        to: String,
        /// Originally requested path, to return to after login.
        redirect: String,
    },
}

/// Gate protected views on the session being authenticated.
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    session: Arc<SessionState>,
}

impl NavigationGuard {
    #[must_use]
    pub const fn new(session: Arc<SessionState>) -> Self {
        Self { session }
    }

    /// Decide whether navigation to `path` may proceed.
    #[must_use]
    pub fn check(&self, path: &str) -> GuardDecision {
        let resolved = resolve(path);
        if resolved.route.no_auth || self.session.is_authenticated() {
            return GuardDecision::Proceed(resolved);
        }

        tracing::debug!(path = %resolved.full_path, "Navigation requires login");
        let encoded: String = url::form_urlencoded::byte_serialize(resolved.full_path.as_bytes()).collect();
        GuardDecision::Redirect {
            to: format!("{LOGIN_PATH}?redirect={encoded}"),
            redirect: resolved.full_path,
        }
    }
}

/// Resolve a path (optionally with a query string) to a route.
///
/// `/` is an alias for the home view.
#[must_use]
pub fn resolve(path: &str) -> RouteMatch {
    let (route_path, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };
    let route_path = if route_path.is_empty() || route_path == "/" {
        HOME_PATH
    } else {
        route_path
    };
    let full_path = match query {
        Some(q) => format!("{route_path}?{q}"),
        None => route_path.to_string(),
    };

    for route in ROUTES {
        if let Some(params) = match_pattern(route.pattern, route_path) {
            return RouteMatch {
                route: *route,
                params,
                full_path,
            };
        }
    }

    RouteMatch {
        route: NOT_FOUND,
        params: BTreeMap::from([(
            "pathMatch".to_string(),
            route_path.trim_start_matches('/').to_string(),
        )]),
        full_path,
    }
}

fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let mut pattern_segments = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    let mut params = BTreeMap::new();

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return Some(params),
            (Some(expected), Some(actual)) => {
                if let Some(name) = expected.strip_prefix(':') {
                    params.insert(name.to_string(), actual.to_string());
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use zdrink_core::Credential;

    use super::*;
    use crate::storage::MemoryStorage;

    fn guard(authenticated: bool) -> NavigationGuard {
        let session = Arc::new(SessionState::new(Arc::new(MemoryStorage::new())));
        if authenticated {
            session
                .install_credential(Credential::new("a1", None))
                .unwrap();
        }
        NavigationGuard::new(session)
    }

    #[test]
    fn test_resolve_captures_params() {
        let m = resolve("/menu/12");
        assert_eq!(m.route.name, "Menu");
        assert_eq!(m.params.get("shopId").map(String::as_str), Some("12"));

        assert_eq!(resolve("/order/create").route.name, "OrderCreate");
        assert_eq!(resolve("/order/99").route.name, "OrderDetail");
    }

    #[test]
    fn test_root_is_home() {
        assert_eq!(resolve("/").route.name, "Home");
        assert_eq!(resolve("/").full_path, "/home");
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let m = resolve("/nope/deeper");
        assert_eq!(m.route.name, "NotFound");
        assert!(!m.route.no_auth);
    }

    #[test]
    fn test_anonymous_is_redirected_with_full_path() {
        let decision = guard(false).check("/cart?from=menu");
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/login?redirect=%2Fcart%3Ffrom%3Dmenu".to_string(),
                redirect: "/cart?from=menu".to_string(),
            }
        );
    }

    #[test]
    fn test_no_auth_views_are_open() {
        assert!(matches!(guard(false).check("/login"), GuardDecision::Proceed(_)));
        assert!(matches!(guard(false).check("/register"), GuardDecision::Proceed(_)));
        assert!(matches!(
            guard(false).check("/missing"),
            GuardDecision::Redirect { .. }
        ));
    }

    #[test]
    fn test_authenticated_proceeds() {
        let decision = guard(true).check("/profile");
        assert!(matches!(decision, GuardDecision::Proceed(m) if m.route.name == "Profile"));
    }
}
