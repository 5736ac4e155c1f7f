use dioxus::prelude::*;
use dioxus_router::{Link, use_navigator};
use services::{QuestionCounts, dashboard_rows};

use crate::auth_state::use_auth_state;
use crate::context::AppContext;
use crate::routes::Route;
use crate::views::changes::{ChangeWatch, use_change_counter};
use crate::views::{ViewError, ViewState, view_state_from_resource};
use crate::vm::{SubjectCardVm, map_subject_cards};

#[component]
pub fn DashboardView(q: String) -> Element {
    let ctx = use_context::<AppContext>();
    let navigator = use_navigator();
    let auth = use_auth_state();
    let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
    let stats_changes = use_change_counter(ChangeWatch::Stats, user_id);

    let overview = ctx.overview();
    let counts = {
        let overview = overview.clone();
        use_resource(move || {
            let overview = overview.clone();
            async move { overview.fetch_question_counts().await }
        })
    };
    let stats = use_resource(move || {
        let overview = overview.clone();
        let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
        stats_changes();
        async move {
            let Some(user_id) = user_id else {
                return Ok(Vec::new());
            };
            overview
                .fetch_stats(&user_id)
                .await
                .map_err(ViewError::from_error)
        }
    });

    let state = view_state_from_resource(&stats);
    let counts_value: QuestionCounts = counts.value().read().clone().unwrap_or_default();
    let query = q.clone();

    rsx! {
        div { class: "page dashboard-page",
            header { class: "page-header",
                h2 { "Dashboard" }
                input {
                    class: "search-input",
                    r#type: "search",
                    placeholder: "Search subjects",
                    value: "{q}",
                    oninput: move |evt| {
                        let _ = navigator.replace(Route::Dashboard { q: evt.value() });
                    },
                }
            }
            if let Some(message) = counts_value.error.clone() {
                p { class: "banner banner-error", "{message}" }
            }

            match state {
                ViewState::Idle => rsx! {
                    p { "Idle" }
                },
                ViewState::Loading => rsx! {
                    p { "Loading..." }
                },
                ViewState::Ready(stats) => {
                    let cards = map_subject_cards(&dashboard_rows(&query, &counts_value, &stats));
                    rsx! {
                        if cards.is_empty() {
                            p { class: "empty", "No subjects match \"{query}\"." }
                        } else {
                            div { class: "subject-grid",
                                for card in cards {
                                    SubjectCard { key: "{card.subject}", card }
                                }
                            }
                        }
                    }
                }
                ViewState::Error(err) => rsx! {
                    p { class: "banner banner-error", "{err.message()}" }
                    button {
                        class: "btn btn-secondary",
                        r#type: "button",
                        onclick: move |_| {
                            let mut stats = stats;
                            stats.restart();
                        },
                        "Retry"
                    }
                },
            }
        }
    }
}

#[component]
fn SubjectCard(card: SubjectCardVm) -> Element {
    rsx! {
        Link { class: "subject-card", to: Route::quiz(card.subject.clone()),
            h3 { "{card.subject}" }
            p { class: "subject-card__count", "{card.questions_label}" }
            p { "{card.attempted_label}" }
            p { "{card.marks_label}" }
            div { class: "bar",
                div { class: "bar-fill", style: "width: {card.score_width}%" }
            }
            p { class: "subject-card__score", "{card.score_label}" }
        }
    }
}
