use dioxus::prelude::*;
use dioxus_router::Router;

use crate::auth_state::AuthProvider;
use crate::routes::Route;
use crate::theme::ThemeProvider;

#[component]
pub fn App() -> Element {
    rsx! {
        document::Stylesheet { href: asset!("/assets/style.css") }

        document::Title { "PrepBank" }

        ThemeProvider {
            AuthProvider {
                ErrorBoundary {
                    handle_error: |errors: ErrorContext| rsx! {
                        div { class: "fatal",
                            h1 { "Something went wrong" }
                            pre { "{errors:?}" }
                        }
                    },
                    Router::<Route> {}
                }
            }
        }
    }
}
