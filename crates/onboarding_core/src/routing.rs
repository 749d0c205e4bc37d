//! crates/onboarding_core/src/routing.rs
//!
//! The route guard: decides, for a requested client path and the current
//! session, whether to render the target view or redirect elsewhere.

use uuid::Uuid;

use crate::domain::Role;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Loading,
    Home,
    About,
    Login,
    Signup,
    StudentDashboard,
    AdminDashboard,
    ModuleDetail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render(View),
    Redirect(String),
    NotFound,
}

/// Client routes, with the base path already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Root,
    Home,
    About,
    Login,
    Signup,
    StudentDashboard,
    AdminDashboard,
    Module(String),
}

impl Route {
    fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let route = match trimmed {
            "" => Route::Root,
            "/home" => Route::Home,
            "/about" => Route::About,
            "/login" => Route::Login,
            "/signup" => Route::Signup,
            "/student-dashboard" => Route::StudentDashboard,
            "/admin-dashboard" => Route::AdminDashboard,
            other => {
                let id = other.strip_prefix("/modules/")?;
                if id.is_empty() || id.contains('/') {
                    return None;
                }
                Route::Module(id.to_string())
            }
        };
        Some(route)
    }
}

/// Evaluates the guard policy for client paths mounted under `base_path`.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    base_path: String,
}

impl RouteGuard {
    pub fn new(base_path: &str) -> Self {
        let base_path = base_path.trim_end_matches('/');
        let base_path = if base_path.is_empty() || base_path.starts_with('/') {
            base_path.to_string()
        } else {
            format!("/{base_path}")
        };
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Prefixes a client path with the base path.
    pub fn href(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }

    fn strip_base<'a>(&self, path: &'a str) -> &'a str {
        if self.base_path.is_empty() {
            return path;
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?', '#']) => rest,
            _ => path,
        }
    }

    pub fn guard(&self, path: &str, session: &SessionSnapshot) -> RouteDecision {
        let Some(route) = Route::parse(self.strip_base(path)) else {
            return RouteDecision::NotFound;
        };
        let redirect = |to: &str| RouteDecision::Redirect(self.href(to));

        let role = match session {
            SessionSnapshot::Loading => return RouteDecision::Render(View::Loading),
            SessionSnapshot::SignedOut => None,
            SessionSnapshot::SignedIn { role, .. } => Some(*role),
        };

        match (route, role) {
            (Route::Root, _) => redirect("/home"),
            (Route::Home, _) => RouteDecision::Render(View::Home),
            (Route::About, _) => RouteDecision::Render(View::About),
            (Route::Signup, _) => RouteDecision::Render(View::Signup),
            (Route::Login, None) => RouteDecision::Render(View::Login),
            (Route::Login, Some(role)) => redirect(role.dashboard_path()),
            (Route::StudentDashboard, Some(Role::Student)) => {
                RouteDecision::Render(View::StudentDashboard)
            }
            (Route::AdminDashboard, Some(Role::Admin)) => {
                RouteDecision::Render(View::AdminDashboard)
            }
            (Route::Module(id), Some(Role::Student)) => {
                RouteDecision::Render(View::ModuleDetail(id))
            }
            (Route::StudentDashboard | Route::AdminDashboard | Route::Module(_), _) => {
                redirect("/login")
            }
        }
    }
}

/// Parses the `:id` segment of a module route.
pub fn module_id(view: &View) -> Option<Uuid> {
    match view {
        View::ModuleDetail(id) => Uuid::parse_str(id).ok(),
        _ => None,
    }
}
