use dioxus::prelude::*;
use dioxus_router::{Link, Outlet, Routable, use_navigator};
use services::{Redirect, RouteAccess, redirect_for};

use crate::auth_state::use_auth_state;
use crate::context::AppContext;
use crate::theme::ThemeToggle;
use crate::views::{BookmarksView, DashboardView, LoginView, PrepDnaView, QuizView};

#[derive(Clone, Routable, PartialEq, Debug)]
#[rustfmt::skip]
pub enum Route {
    #[route("/", RootRedirect)] Root {},
    #[route("/login", LoginView)] Login {},
    #[layout(Layout)]
        #[route("/dashboard?:q", DashboardView)] Dashboard { q: String },
        #[route("/bookmarks", BookmarksView)] Bookmarks {},
        #[route("/prepdna", PrepDnaView)] PrepDna {},
        #[route("/quiz/:subject?:qid", QuizView)] Quiz { subject: String, qid: String },
    #[end_layout]
    #[route("/:..segments", NotFound)] NotFound { segments: Vec<String> },
}

impl Route {
    #[must_use]
    pub fn dashboard() -> Self {
        Route::Dashboard { q: String::new() }
    }

    #[must_use]
    pub fn quiz(subject: impl Into<String>) -> Self {
        Route::Quiz {
            subject: subject.into(),
            qid: String::new(),
        }
    }
}

impl From<Redirect> for Route {
    fn from(redirect: Redirect) -> Self {
        match redirect {
            Redirect::Login => Route::Login {},
            Redirect::Dashboard => Route::dashboard(),
        }
    }
}

/// Replace the current route when the auth guard says so. Returns `true`
/// while the page should not render its own content.
pub fn use_route_guard(access: RouteAccess) -> bool {
    let auth = use_auth_state();
    let navigator = use_navigator();
    let state = auth.read().clone();
    let redirect = redirect_for(&state, access);

    use_effect(move || {
        if let Some(target) = redirect_for(&auth.read(), access) {
            let _ = navigator.replace(Route::from(target));
        }
    });

    state.loading || redirect.is_some()
}

#[component]
fn RootRedirect() -> Element {
    use_route_guard(RouteAccess::Root);
    rsx! {
        div { class: "page page-center",
            p { "Loading..." }
        }
    }
}

#[component]
fn NotFound(segments: Vec<String>) -> Element {
    let path = segments.join("/");
    rsx! {
        div { class: "page page-center",
            h2 { "Page not found" }
            p { "Nothing lives at /{path}." }
            Link { to: Route::dashboard(), "Back to dashboard" }
        }
    }
}

#[component]
fn Layout() -> Element {
    if use_route_guard(RouteAccess::Protected) {
        return rsx! {
            div { class: "page page-center",
                p { "Loading..." }
            }
        };
    }

    rsx! {
        div { class: "app",
            Sidebar {}
            main { class: "content",
                Outlet::<Route> {}
            }
        }
    }
}

#[component]
fn Sidebar() -> Element {
    let ctx = use_context::<AppContext>();
    let auth = use_auth_state();
    let email = auth
        .read()
        .user
        .as_ref()
        .map(|user| user.email.clone())
        .unwrap_or_default();
    let mut logging_out = use_signal(|| false);

    let on_logout = move |_| {
        if logging_out() {
            return;
        }
        logging_out.set(true);
        let auth = ctx.auth();
        spawn(async move {
            if let Err(err) = auth.logout().await {
                tracing::warn!(error = %err, "sign-out call failed");
            }
            logging_out.set(false);
        });
    };

    rsx! {
        nav { class: "sidebar",
            h1 { "PrepBank" }
            ul {
                li { Link { to: Route::dashboard(), "Dashboard" } }
                li { Link { to: Route::Bookmarks {}, "Bookmarks" } }
                li { Link { to: Route::PrepDna {}, "PrepDNA" } }
            }
            div { class: "sidebar-footer",
                ThemeToggle {}
                if !email.is_empty() {
                    p { class: "sidebar-user", "{email}" }
                }
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    disabled: logging_out(),
                    onclick: on_logout,
                    "Log out"
                }
            }
        }
    }
}
