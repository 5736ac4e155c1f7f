use dioxus::prelude::*;
use services::AuthState;

use crate::context::AppContext;

/// Reactive copy of the auth state, provided by [`AuthProvider`].
#[derive(Clone, Copy)]
pub struct AuthSignal(pub Signal<AuthState>);

#[must_use]
pub fn use_auth_state() -> Signal<AuthState> {
    use_context::<AuthSignal>().0
}

/// Mirrors the auth service's change stream into a signal and runs the
/// initial session probe when it has not happened yet.
#[component]
pub fn AuthProvider(children: Element) -> Element {
    let ctx = use_context::<AppContext>();
    let auth = ctx.auth();
    let initial = auth.state();
    let mut state = use_context_provider(|| AuthSignal(Signal::new(initial))).0;

    use_future(move || {
        let auth = auth.clone();
        async move {
            let mut changes = auth.subscribe();
            if auth.state().loading {
                if let Err(err) = auth.init().await {
                    tracing::warn!(error = %err, "session probe failed");
                }
            }
            loop {
                let current = changes.borrow_and_update().clone();
                if *state.peek() != current {
                    state.set(current);
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        }
    });

    rsx! { {children} }
}
