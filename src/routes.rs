//! Route table and the guard deciding what a path renders.
//!
//! The guard is a UX convenience; the backend enforces access on every call.

use crate::session::{is_member_only, DASHBOARD_ROUTE, HOME_ROUTE, LOGIN_ROUTE, ROOT_ROUTE};
use serde::Serialize;
use std::collections::BTreeSet;

/// Paths an anonymous visitor may stay on.
const PUBLIC_PATHS: [&str; 4] = [HOME_ROUTE, ROOT_ROUTE, LOGIN_ROUTE, "/profile"];
/// Paths rendered without the sidebar regardless of roles.
const BARE_PATHS: [&str; 3] = [HOME_ROUTE, ROOT_ROUTE, "/profile"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Login,
    Dashboard,
    Users,
    Roles,
    Permissions,
    Branches,
    Session,
    Profile,
    NotFound,
}

impl Route {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path {
            "/" | "/home" => Route::Home,
            "/login" => Route::Login,
            "/dashboard" => Route::Dashboard,
            "/users" => Route::Users,
            "/roles" => Route::Roles,
            "/permissions" => Route::Permissions,
            "/branches" => Route::Branches,
            "/session" => Route::Session,
            "/profile" => Route::Profile,
            _ => Route::NotFound,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GuardInput<'a> {
    pub verified: bool,
    pub is_authenticated: bool,
    pub path: &'a str,
    pub roles: &'a BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Only the challenge renders.
    VerifyHuman,
    Redirect { to: &'static str },
    /// Login page inside the standard shell.
    Login,
    Render { route: Route, sidebar: bool },
}

/// Decides what to render for `input.path`. Rules apply in order.
#[must_use]
pub fn decide(input: &GuardInput<'_>) -> RouteDecision {
    if !input.verified {
        return RouteDecision::VerifyHuman;
    }

    let path = input.path;
    if !input.is_authenticated && !PUBLIC_PATHS.contains(&path) {
        return RouteDecision::Redirect { to: HOME_ROUTE };
    }

    if path == LOGIN_ROUTE {
        if !input.is_authenticated {
            return RouteDecision::Login;
        }
        let to = if is_member_only(input.roles) {
            HOME_ROUTE
        } else {
            DASHBOARD_ROUTE
        };
        return RouteDecision::Redirect { to };
    }

    let route = Route::from_path(path);
    if BARE_PATHS.contains(&path) {
        return RouteDecision::Render {
            route,
            sidebar: false,
        };
    }

    RouteDecision::Render {
        route,
        sidebar: !is_member_only(input.roles),
    }
}
