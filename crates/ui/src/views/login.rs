use dioxus::prelude::*;
use services::RouteAccess;

use crate::context::AppContext;
use crate::routes::use_route_guard;

#[component]
pub fn LoginView() -> Element {
    let ctx = use_context::<AppContext>();
    let blocked = use_route_guard(RouteAccess::Login);
    let mut username = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut error = use_signal(|| None::<String>);
    let mut submitting = use_signal(|| false);

    let on_submit = move |evt: FormEvent| {
        evt.prevent_default();
        if submitting() {
            return;
        }
        submitting.set(true);
        error.set(None);
        let auth = ctx.auth();
        let user = username.read().clone();
        let pass = password.read().clone();
        spawn(async move {
            // Success flips the auth state and the guard moves on to the dashboard.
            if let Err(err) = auth.login(&user, &pass).await {
                tracing::info!(error = %err, "login rejected");
                error.set(Some(err.to_string()));
            }
            submitting.set(false);
        });
    };

    if blocked {
        return rsx! {
            div { class: "page page-center",
                p { "Loading..." }
            }
        };
    }

    rsx! {
        div { class: "page page-center login-page",
            form { class: "login-card", onsubmit: on_submit,
                h1 { "PrepBank" }
                p { class: "login-subtitle", "Sign in to continue your preparation." }
                label { r#for: "login-username", "Username" }
                input {
                    id: "login-username",
                    r#type: "text",
                    autocomplete: "username",
                    value: "{username}",
                    oninput: move |evt| username.set(evt.value()),
                }
                label { r#for: "login-password", "Password" }
                input {
                    id: "login-password",
                    r#type: "password",
                    autocomplete: "current-password",
                    value: "{password}",
                    oninput: move |evt| password.set(evt.value()),
                }
                if let Some(message) = error() {
                    p { class: "form-error", role: "alert", "{message}" }
                }
                button {
                    class: "btn btn-primary",
                    r#type: "submit",
                    disabled: submitting(),
                    if submitting() { "Signing in..." } else { "Sign in" }
                }
            }
        }
    }
}
