use dioxus::prelude::*;
use services::prep_dna;

use crate::auth_state::use_auth_state;
use crate::context::AppContext;
use crate::views::changes::{ChangeWatch, use_change_counter};
use crate::views::{ViewError, ViewState, view_state_from_resource};
use crate::vm::{PrepDnaRowVm, PrepDnaVm, map_prep_dna};

#[component]
pub fn PrepDnaView() -> Element {
    let ctx = use_context::<AppContext>();
    let auth = use_auth_state();
    let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
    let stats_changes = use_change_counter(ChangeWatch::Stats, user_id);

    let overview = ctx.overview();
    let resource = use_resource(move || {
        let overview = overview.clone();
        let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
        stats_changes();
        async move {
            let stats = match user_id {
                Some(user_id) => overview
                    .fetch_stats(&user_id)
                    .await
                    .map_err(ViewError::from_error)?,
                None => Vec::new(),
            };
            let counts = overview.fetch_question_counts().await;
            Ok::<_, ViewError>((map_prep_dna(&prep_dna(&counts, &stats)), counts.error))
        }
    });

    let state = view_state_from_resource(&resource);

    rsx! {
        div { class: "page prepdna-page",
            h2 { "PrepDNA" }
            match state {
                ViewState::Idle => rsx! {
                    p { "Idle" }
                },
                ViewState::Loading => rsx! {
                    p { "Loading..." }
                },
                ViewState::Ready((vm, counts_error)) => rsx! {
                    if let Some(message) = counts_error {
                        p { class: "banner banner-error", "{message}" }
                    }
                    PrepDnaBody { vm }
                },
                ViewState::Error(err) => rsx! {
                    p { class: "banner banner-error", "{err.message()}" }
                    button {
                        class: "btn btn-secondary",
                        r#type: "button",
                        onclick: move |_| {
                            let mut resource = resource;
                            resource.restart();
                        },
                        "Retry"
                    }
                },
            }
        }
    }
}

#[component]
fn PrepDnaBody(vm: PrepDnaVm) -> Element {
    let overall = vm.overall.clone();
    rsx! {
        section { class: "prepdna-overall",
            h3 { "Overall" }
            p { "{overall.attempted_label}" }
            p { "{overall.marks_label} ({overall.marks_percent_label})" }
            div { class: "bar",
                div { class: "bar-fill", style: "width: {overall.completion_width}%" }
            }
            p { "Completion: {overall.completion_label}" }
        }
        if vm.rows.is_empty() {
            p { class: "empty", "Answer a few questions to see your subject profile." }
        } else {
            ul { class: "prepdna-list",
                for row in vm.rows {
                    PrepDnaItem { key: "{row.subject}", row }
                }
            }
        }
    }
}

#[component]
fn PrepDnaItem(row: PrepDnaRowVm) -> Element {
    rsx! {
        li { class: "prepdna-row {row.band_class}",
            div { class: "prepdna-row__head",
                span { class: "prepdna-row__subject", "{row.subject}" }
                span { class: "prepdna-row__accuracy", "{row.accuracy_label}" }
            }
            p { "{row.answers_label}" }
            p { "{row.marks_label}" }
            div { class: "bar",
                div { class: "bar-fill", style: "width: {row.completion_width}%" }
            }
            p { "{row.completion_label}" }
        }
    }
}
