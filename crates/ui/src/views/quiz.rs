use std::collections::VecDeque;
use std::time::Duration;

use dioxus::prelude::*;
use dioxus_router::Link;
use quiz_core::model::{QuestionId, Subject};
use services::quiz::{
    Phase, QuizCommand, QuizRunner, QuizSession, QuizStateSaver, RESET_CONFIRM_PROMPT,
    TOAST_DURATION, Toast, ToastKind,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::auth_state::use_auth_state;
use crate::context::AppContext;
use crate::routes::Route;
use crate::views::changes::{ChangeWatch, use_change_counter};
use crate::vm::{
    OptionVm, QuestionVm, QuizIntent, apply_intent, intent_for_key, loaded_label, map_question,
    position_label, progress_label,
};

/// Commands tagged with the epoch of the session that issued them.
type Batch = (u64, Vec<QuizCommand>);

/// Runs session commands one at a time, in issue order, and folds each
/// outcome back into the session that asked for it.
fn use_command_pump(
    runner: QuizRunner,
    session: Signal<Option<QuizSession>>,
) -> mpsc::UnboundedSender<Batch> {
    use_hook(move || {
        let (tx, mut rx) = mpsc::unbounded_channel::<Batch>();
        let mut session = session;
        spawn(async move {
            while let Some((epoch, commands)) = rx.recv().await {
                let mut queue: VecDeque<QuizCommand> = commands.into();
                while let Some(command) = queue.pop_front() {
                    let outcome = runner.execute(command).await;
                    let mut guard = session.write();
                    match guard.as_mut() {
                        Some(current) if current.epoch() == epoch => {
                            queue.extend(current.apply(outcome));
                        }
                        _ => {
                            tracing::debug!(epoch, "dropping result for a replaced quiz");
                            queue.clear();
                        }
                    }
                }
            }
        });
        tx
    })
}

fn send(pump: &mpsc::UnboundedSender<Batch>, epoch: u64, commands: Vec<QuizCommand>) {
    if commands.is_empty() {
        return;
    }
    if pump.send((epoch, commands)).is_err() {
        tracing::warn!(epoch, "quiz command pump has stopped");
    }
}

fn parse_target(qid: &str) -> Option<QuestionId> {
    let trimmed = qid.trim();
    if trimmed.is_empty() {
        return None;
    }
    QuestionId::new(trimmed).ok()
}

#[component]
pub fn QuizView(subject: String, qid: String) -> Element {
    let ctx = use_context::<AppContext>();
    let auth = use_auth_state();
    let user_id = auth.read().user.as_ref().map(|user| user.id.clone());
    let stats_changes = use_change_counter(ChangeWatch::Stats, user_id.clone());

    let mut session = use_signal(|| None::<QuizSession>);
    let mut saver = use_signal(|| None::<QuizStateSaver>);
    let restart = use_signal(|| 0_u32);
    let pump = use_command_pump(ctx.quiz_runner(), session);

    // A new subject, target or user is a new session.
    {
        let pump = pump.clone();
        let ctx = ctx.clone();
        use_effect(use_reactive!(|(subject, qid, user_id)| {
            restart();
            let mut next =
                QuizSession::new(Subject::new(subject.clone()), user_id.clone(), parse_target(&qid));
            let commands = next.start();
            let epoch = next.epoch();
            saver.set(user_id.clone().map(|id| ctx.quiz_state_saver(id)));
            session.set(Some(next));
            send(&pump, epoch, commands);
        }));
    }

    {
        let pump = pump.clone();
        use_effect(move || {
            if stats_changes() == 0 {
                return;
            }
            let batch = session
                .write()
                .as_mut()
                .map(|current| (current.epoch(), current.stats_changed()));
            if let Some((epoch, commands)) = batch {
                send(&pump, epoch, commands);
            }
        });
    }

    use_future(move || async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            let running = session
                .peek()
                .as_ref()
                .is_some_and(|current| current.timer().is_running());
            if running {
                if let Some(current) = session.write().as_mut() {
                    current.tick();
                }
            }
        }
    });

    let toast_seq = use_memo(move || {
        session
            .read()
            .as_ref()
            .and_then(|current| current.toast().map(|toast| toast.seq))
    });
    use_effect(move || {
        let Some(seq) = toast_seq() else {
            return;
        };
        spawn(async move {
            tokio::time::sleep(TOAST_DURATION).await;
            if let Some(current) = session.write().as_mut() {
                current.dismiss_toast(seq);
            }
        });
    });

    let snapshot = use_memo(move || session.read().as_ref().and_then(QuizSession::snapshot));
    use_effect(move || {
        let Some(state) = snapshot() else {
            return;
        };
        if let Some(saver) = saver.peek().as_ref() {
            saver.schedule(state);
        }
    });

    let on_intent = {
        let pump = pump.clone();
        use_callback(move |intent: QuizIntent| {
            let batch = session
                .write()
                .as_mut()
                .map(|current| (current.epoch(), apply_intent(current, intent)));
            if let Some((epoch, commands)) = batch {
                send(&pump, epoch, commands);
            }
        })
    };

    let on_key = move |evt: KeyboardEvent| {
        let option_count = session
            .peek()
            .as_ref()
            .and_then(QuizSession::current)
            .map_or(0, |question| question.options().len());
        if let Some(intent) = intent_for_key(&evt.data.key().to_string(), option_count) {
            evt.prevent_default();
            on_intent.call(intent);
        }
    };

    let guard = session.read();
    let Some(current) = guard.as_ref() else {
        return rsx! {
            div { class: "page quiz-page",
                p { "Loading questions..." }
            }
        };
    };

    let header = current.header();
    let phase = current.phase();
    let question = map_question(current);
    let has_question = question.is_some();
    let position = position_label(&header);
    let progress = progress_label(&header);
    let loaded = loaded_label(&header);
    let toast = current.toast().cloned();
    let blocking_error = current.blocking_error().map(str::to_owned);
    let reset_pending = current.reset_pending();
    let near_end = current.near_loaded_end();
    let can_prev = current.index() > 0;
    let can_next = !current.is_busy() && !current.is_page_loading();
    let bookmark_busy = current.is_bookmark_busy();
    let signed_in = current.user().is_some();
    let timer_label = if header.timer_running { "Pause" } else { "Start" };
    drop(guard);

    rsx! {
        div { class: "page quiz-page", tabindex: "0", onkeydown: on_key,
            header { class: "quiz-header",
                Link { class: "quiz-back", to: Route::dashboard(), "Back to dashboard" }
                h2 { "{header.subject}" }
                p { class: "quiz-position", "{position}" }
                p { class: "quiz-progress", "{progress}" }
                p { class: "quiz-loaded", "{loaded}" }
                div { class: "quiz-timer",
                    span { class: "quiz-timer__text", "{header.timer_text}" }
                    button {
                        class: "btn btn-secondary",
                        r#type: "button",
                        onclick: move |_| on_intent.call(QuizIntent::ToggleTimer),
                        "{timer_label}"
                    }
                }
                div { class: "quiz-actions",
                    button {
                        class: "btn btn-ghost",
                        r#type: "button",
                        disabled: bookmark_busy || !has_question || !signed_in,
                        onclick: move |_| on_intent.call(QuizIntent::Bookmark),
                        "Bookmark"
                    }
                    button {
                        class: "btn btn-danger",
                        r#type: "button",
                        disabled: !signed_in,
                        onclick: move |_| on_intent.call(QuizIntent::RequestReset),
                        "Reset"
                    }
                }
            }

            if let Some(message) = blocking_error {
                div { class: "panel panel-error",
                    p { "{message}" }
                    button {
                        class: "btn btn-secondary",
                        r#type: "button",
                        onclick: move |_| {
                            let mut restart = restart;
                            restart += 1;
                        },
                        "Retry"
                    }
                }
            } else {
                match phase {
                    Phase::Idle | Phase::Loading => rsx! {
                        p { "Loading questions..." }
                    },
                    Phase::Resuming => rsx! {
                        p { "Finding where you left off..." }
                    },
                    Phase::Ready | Phase::Advancing => rsx! {
                        if let Some(question) = question {
                            QuestionCard { question, on_intent }
                            if phase == Phase::Advancing {
                                p { class: "quiz-hint", "Loading more questions..." }
                            } else if near_end {
                                p { class: "quiz-hint", "Reaching the end of the loaded set. More questions load as you go." }
                            }
                            nav { class: "quiz-nav",
                                button {
                                    class: "btn btn-secondary",
                                    r#type: "button",
                                    disabled: !can_prev,
                                    onclick: move |_| on_intent.call(QuizIntent::Prev),
                                    "Previous"
                                }
                                button {
                                    class: "btn btn-primary",
                                    r#type: "button",
                                    disabled: !can_next,
                                    onclick: move |_| on_intent.call(QuizIntent::Next),
                                    "Next"
                                }
                            }
                        } else {
                            p { class: "empty", "No questions available for this subject yet." }
                        }
                    },
                }
            }

            if let Some(toast) = toast {
                ToastBanner { toast }
            }
            if reset_pending {
                ResetDialog { on_intent }
            }
        }
    }
}

#[component]
fn QuestionCard(question: QuestionVm, on_intent: EventHandler<QuizIntent>) -> Element {
    let locked = question.locked;
    rsx! {
        article { class: "question-card",
            p { class: "question-card__text", "{question.text}" }
            if let Some(hint) = question.multi_hint {
                p { class: "question-card__hint", "{hint}" }
            }
            ul { class: "quiz-options",
                for option in question.options {
                    OptionButton { key: "{option.index}", option, locked, on_intent }
                }
            }
            if let Some(verdict) = question.verdict {
                p { class: "question-card__verdict", "{verdict}" }
            }
            if let Some(explanation) = question.explanation {
                div { class: "question-card__explanation",
                    h4 { "Explanation" }
                    p { "{explanation}" }
                }
            }
        }
    }
}

#[component]
fn OptionButton(option: OptionVm, locked: bool, on_intent: EventHandler<QuizIntent>) -> Element {
    let index = option.index;
    rsx! {
        li {
            button {
                class: "{option.state.css_class()}",
                r#type: "button",
                disabled: locked,
                onclick: move |_| on_intent.call(QuizIntent::Select(index)),
                span { class: "quiz-option__letter", "{option.letter}" }
                span { class: "quiz-option__text", "{option.text}" }
            }
        }
    }
}

#[component]
fn ToastBanner(toast: Toast) -> Element {
    let class = match toast.kind {
        ToastKind::Info => "toast toast--info",
        ToastKind::Error => "toast toast--error",
    };
    rsx! {
        div { class: "{class}", role: "status", "{toast.message}" }
    }
}

#[component]
fn ResetDialog(on_intent: EventHandler<QuizIntent>) -> Element {
    rsx! {
        div { class: "modal-overlay",
            div { class: "modal", role: "dialog", aria_modal: "true",
                p { "{RESET_CONFIRM_PROMPT}" }
                div { class: "modal__actions",
                    button {
                        class: "btn btn-secondary",
                        r#type: "button",
                        onclick: move |_| on_intent.call(QuizIntent::CancelReset),
                        "Cancel"
                    }
                    button {
                        class: "btn btn-danger",
                        r#type: "button",
                        onclick: move |_| on_intent.call(QuizIntent::ConfirmReset),
                        "Reset"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_or_invalid_target_is_ignored() {
        assert_eq!(parse_target(""), None);
        assert_eq!(parse_target("   "), None);
        assert_eq!(parse_target(" q-7 "), Some(QuestionId::new("q-7").unwrap()));
    }
}
