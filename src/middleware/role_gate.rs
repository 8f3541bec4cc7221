// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page navigation gate.
//!
//! Every page request is classified by who is asking (anonymous, broken
//! session, member, admin) and which page it targets. Members are confined
//! to `/user`, admins to `/admin`, and anonymous visitors to the public
//! pages.

use crate::middleware::auth::{removal_cookie, session_token, verify_session_token};
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Pages reachable without a session.
const PUBLIC_PATHS: &[&str] = &["/", "/login", "/register", "/forgot-password"];

const ADMIN_HOME: &str = "/admin";
const USER_HOME: &str = "/user";
const LOGIN_PAGE: &str = "/login";

const STATIC_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js", "map", "woff", "woff2",
    "ttf", "txt", "webmanifest",
];

/// Who is requesting the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    /// A session cookie was presented but failed verification
    InvalidSession,
    Member(Role),
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue { clear_session: bool },
    Redirect { to: &'static str, clear_session: bool },
}

/// Assets and framework files that are served without a session check.
pub fn is_static_asset(path: &str) -> bool {
    if path.starts_with("/assets/") || path == "/favicon.ico" {
        return true;
    }
    if matches!(path, "/sw.js" | "/manifest.json" | "/robots.txt") {
        return true;
    }
    let last = path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.')
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

pub fn is_public(path: &str) -> bool {
    let path = normalize(path);
    PUBLIC_PATHS.contains(&path)
}

/// `path` is `root` itself or lies below it, segment-wise.
fn in_subtree(path: &str, root: &str) -> bool {
    let path = normalize(path);
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Decide what to do with a page request.
pub fn decide(path: &str, viewer: Viewer) -> GateDecision {
    if is_public(path) {
        return match viewer {
            Viewer::Anonymous => GateDecision::Continue {
                clear_session: false,
            },
            Viewer::InvalidSession => GateDecision::Continue {
                clear_session: true,
            },
            Viewer::Member(Role::Admin) => GateDecision::Redirect {
                to: ADMIN_HOME,
                clear_session: false,
            },
            Viewer::Member(Role::User) => GateDecision::Redirect {
                to: USER_HOME,
                clear_session: false,
            },
        };
    }

    match viewer {
        Viewer::Anonymous => GateDecision::Redirect {
            to: LOGIN_PAGE,
            clear_session: false,
        },
        Viewer::InvalidSession => GateDecision::Redirect {
            to: LOGIN_PAGE,
            clear_session: true,
        },
        Viewer::Member(Role::Admin) if !in_subtree(path, ADMIN_HOME) => GateDecision::Redirect {
            to: ADMIN_HOME,
            clear_session: false,
        },
        Viewer::Member(Role::User) if !in_subtree(path, USER_HOME) => GateDecision::Redirect {
            to: USER_HOME,
            clear_session: false,
        },
        Viewer::Member(_) => GateDecision::Continue {
            clear_session: false,
        },
    }
}

async fn identify(state: &AppState, token: Option<String>) -> Viewer {
    let Some(token) = token else {
        return Viewer::Anonymous;
    };

    let claims = match verify_session_token(&token, &state.config.session_signing_key) {
        Ok(claims) => claims,
        Err(_) => return Viewer::InvalidSession,
    };

    let role = match state.db.get_user(&claims.sub).await {
        Ok(Some(user)) => user.role(),
        Ok(None) => Role::User,
        Err(e) => {
            tracing::warn!(uid = %claims.sub, error = %e, "Role lookup failed; treating as user");
            Role::User
        }
    };

    Viewer::Member(role)
}

/// Middleware applying [`decide`] to page requests.
pub async fn role_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_static_asset(&path) {
        return next.run(request).await;
    }

    let token = session_token(&jar, request.headers());
    let viewer = identify(&state, token).await;
    let decision = decide(&path, viewer);
    tracing::debug!(path = %path, ?viewer, ?decision, "Role gate");

    let (mut response, clear_session) = match decision {
        GateDecision::Continue { clear_session } => (next.run(request).await, clear_session),
        GateDecision::Redirect { to, clear_session } => {
            (Redirect::temporary(to).into_response(), clear_session)
        }
    };

    if clear_session {
        let cookie = removal_cookie(state.config.secure_cookies()).to_string();
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(to: &'static str) -> GateDecision {
        GateDecision::Redirect {
            to,
            clear_session: false,
        }
    }

    const CONTINUE: GateDecision = GateDecision::Continue {
        clear_session: false,
    };

    #[test]
    fn public_pages() {
        assert_eq!(decide("/login", Viewer::Anonymous), CONTINUE);
        assert_eq!(
            decide("/", Viewer::InvalidSession),
            GateDecision::Continue {
                clear_session: true
            }
        );
        assert_eq!(decide("/login", Viewer::Member(Role::Admin)), redirect("/admin"));
        assert_eq!(decide("/register", Viewer::Member(Role::User)), redirect("/user"));
    }

    #[test]
    fn protected_pages() {
        assert_eq!(decide("/user", Viewer::Anonymous), redirect("/login"));
        assert_eq!(
            decide("/admin/topup", Viewer::InvalidSession),
            GateDecision::Redirect {
                to: "/login",
                clear_session: true
            }
        );
        assert_eq!(decide("/user/history", Viewer::Member(Role::Admin)), redirect("/admin"));
        assert_eq!(decide("/admin", Viewer::Member(Role::User)), redirect("/user"));
        assert_eq!(decide("/admin/users/abc", Viewer::Member(Role::Admin)), CONTINUE);
        assert_eq!(decide("/user/", Viewer::Member(Role::User)), CONTINUE);
    }

    #[test]
    fn subtree_match_is_segment_aware() {
        assert_eq!(decide("/administrator", Viewer::Member(Role::Admin)), redirect("/admin"));
        assert_eq!(decide("/username", Viewer::Member(Role::User)), redirect("/user"));
    }

    #[test]
    fn static_assets_bypass() {
        assert!(is_static_asset("/assets/index-abc123.js"));
        assert!(is_static_asset("/favicon.ico"));
        assert!(is_static_asset("/sw.js"));
        assert!(is_static_asset("/manifest.json"));
        assert!(is_static_asset("/images/logo.PNG"));
        assert!(!is_static_asset("/admin"));
        assert!(!is_static_asset("/user/history"));
    }
}
