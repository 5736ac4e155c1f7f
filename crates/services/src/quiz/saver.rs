use std::sync::{Arc, Mutex};
use std::time::Duration;

use quiz_core::model::{QuizState, UserId};
use tokio::task::JoinHandle;

use crate::progress::ProgressService;

/// Delay between the last change and the write.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(600);

#[derive(Default)]
struct Pending {
    last: Option<QuizState>,
    handle: Option<JoinHandle<()>>,
}

/// Debounced writer for the quiz resume point. Each new state cancels the
/// write scheduled for the previous one.
pub struct QuizStateSaver {
    progress: Arc<ProgressService>,
    user_id: UserId,
    delay: Duration,
    pending: Mutex<Pending>,
}

impl QuizStateSaver {
    #[must_use]
    pub fn new(progress: Arc<ProgressService>, user_id: UserId) -> Self {
        Self {
            progress,
            user_id,
            delay: SAVE_DEBOUNCE,
            pending: Mutex::new(Pending::default()),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Schedule `state` for saving. Repeating the last scheduled state keeps
    /// the timer already running. Must be called inside a tokio runtime.
    pub fn schedule(&self, state: QuizState) {
        let Ok(mut pending) = self.pending.lock() else {
            tracing::warn!("quiz state saver lock poisoned");
            return;
        };
        if pending.last.as_ref() == Some(&state) {
            return;
        }
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }

        let progress = Arc::clone(&self.progress);
        let user_id = self.user_id.clone();
        let delay = self.delay;
        pending.last = Some(state.clone());
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = progress.upsert_quiz_state(&user_id, &state).await {
                tracing::warn!(subject = %state.subject, error = %err, "failed to save quiz state");
            }
        }));
    }

    /// Drop any write that has not fired yet.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.handle.take() {
                handle.abort();
            }
            pending.last = None;
        }
    }
}

impl Drop for QuizStateSaver {
    fn drop(&mut self) {
        self.cancel();
    }
}
