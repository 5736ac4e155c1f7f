use dioxus::prelude::*;
use quiz_core::model::UserId;
use services::Subscription;
use tokio::sync::mpsc;

use crate::context::AppContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeWatch {
    Stats,
    Bookmarks,
}

/// A counter bumped on every change to the user's rows in the watched
/// table. Reading it inside a resource makes that resource refetch.
pub fn use_change_counter(watch: ChangeWatch, user_id: Option<UserId>) -> Signal<u64> {
    let ctx = use_context::<AppContext>();
    let counter = use_signal(|| 0_u64);
    let mut subscription = use_signal(|| None::<Subscription>);

    use_effect(use_reactive!(|(user_id)| {
        // Dropping the old subscription stops its listener as well.
        subscription.set(None);
        let Some(user_id) = user_id else {
            return;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let notify = move || {
            let _ = tx.send(());
        };
        let progress = ctx.progress();
        let subscribed = match watch {
            ChangeWatch::Stats => progress.subscribe_user_subject_stats(&user_id, notify),
            ChangeWatch::Bookmarks => progress.subscribe_user_bookmarks(&user_id, notify),
        };
        match subscribed {
            Ok(handle) => {
                subscription.set(Some(handle));
                let mut counter = counter;
                spawn(async move {
                    while rx.recv().await.is_some() {
                        counter += 1;
                    }
                });
            }
            Err(err) => tracing::debug!(error = %err, ?watch, "change subscription unavailable"),
        }
    }));

    counter
}
