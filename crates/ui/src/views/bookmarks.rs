use dioxus::prelude::*;
use dioxus_router::Link;
use quiz_core::model::QuestionId;

use crate::auth_state::use_auth_state;
use crate::context::AppContext;
use crate::routes::Route;
use crate::views::changes::{ChangeWatch, use_change_counter};
use crate::views::{ViewError, ViewState, view_state_from_resource};
use crate::vm::{BookmarkVm, map_bookmarks};

#[component]
pub fn BookmarksView() -> Element {
    let ctx = use_context::<AppContext>();
    let auth = use_auth_state();
    let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
    let changes = use_change_counter(ChangeWatch::Bookmarks, user_id);
    let mut action_error = use_signal(|| None::<String>);

    let progress = ctx.progress();
    let resource = {
        let progress = progress.clone();
        use_resource(move || {
            let progress = progress.clone();
            let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
            changes();
            async move {
                let Some(user_id) = user_id else {
                    return Ok(Vec::new());
                };
                let items = progress
                    .fetch_user_bookmarks(&user_id)
                    .await
                    .map_err(ViewError::from_error)?;
                Ok::<_, ViewError>(map_bookmarks(&items))
            }
        })
    };

    let on_remove = use_callback(move |question_id: String| {
        let progress = progress.clone();
        let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
        let mut resource = resource;
        spawn(async move {
            let (Some(user_id), Ok(question_id)) = (user_id, QuestionId::new(question_id)) else {
                return;
            };
            match progress.remove_bookmark(&user_id, &question_id).await {
                Ok(()) => {
                    action_error.set(None);
                    resource.restart();
                }
                Err(err) => action_error.set(Some(err.to_string())),
            }
        });
    });

    let state = view_state_from_resource(&resource);

    rsx! {
        div { class: "page bookmarks-page",
            h2 { "Bookmarks" }
            if let Some(message) = action_error() {
                p { class: "banner banner-error", "{message}" }
            }
            match state {
                ViewState::Idle => rsx! {
                    p { "Idle" }
                },
                ViewState::Loading => rsx! {
                    p { "Loading..." }
                },
                ViewState::Ready(items) => rsx! {
                    if items.is_empty() {
                        p { class: "empty", "No bookmarks yet. Use the bookmark button on any question." }
                    } else {
                        ul { class: "bookmark-list",
                            for item in items {
                                BookmarkRow { key: "{item.question_id}", item, on_remove }
                            }
                        }
                    }
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
fn BookmarkRow(item: BookmarkVm, on_remove: EventHandler<String>) -> Element {
    let question_id = item.question_id.clone();
    rsx! {
        li { class: "bookmark",
            Link {
                class: "bookmark__link",
                to: Route::Quiz { subject: item.subject.clone(), qid: item.question_id.clone() },
                span { class: "bookmark__subject", "{item.subject}" }
                span { class: "bookmark__text", "{item.text}" }
            }
            if let Some(saved_at) = item.saved_at.as_deref() {
                span { class: "bookmark__date", "{saved_at}" }
            }
            button {
                class: "btn btn-ghost",
                r#type: "button",
                onclick: move |_| on_remove.call(question_id.clone()),
                "Remove"
            }
        }
    }
}
