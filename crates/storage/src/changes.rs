//! Change notifications.
//!
//! Backends publish one event per successful write made by this process. A
//! feed may also carry a `RemoteChanges` source for writes made elsewhere.
//! Subscribers get a payload-free callback and are expected to re-fetch.

use quiz_core::model::UserId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const FEED_CAPACITY: usize = 256;

/// Tables that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTable {
    Attempts,
    SubjectStats,
    QuizState,
    Bookmarks,
}

impl ChangeTable {
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            ChangeTable::Attempts => "user_question_attempts",
            ChangeTable::SubjectStats => "user_subject_stats",
            ChangeTable::QuizState => "user_quiz_state",
            ChangeTable::Bookmarks => "user_bookmarks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub user_id: UserId,
}

/// Callback shared between the local and remote listeners of one subscription.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Source of change events written by other clients.
pub trait RemoteChanges: Send + Sync {
    /// Spawn a task that calls `on_change` whenever `table` changes for
    /// `user_id` outside this process. The task runs until aborted.
    fn listen(&self, table: ChangeTable, user_id: UserId, on_change: ChangeCallback)
    -> JoinHandle<()>;
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
    remote: Option<Arc<dyn RemoteChanges>>,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.tx.receiver_count())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(FEED_CAPACITY);
        Self { tx, remote: None }
    }

    /// Feed that also listens to `remote` for every subscription.
    #[must_use]
    pub fn with_remote(remote: Arc<dyn RemoteChanges>) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new()
        }
    }

    /// Announce a write. Having no subscribers is not an error.
    pub fn publish(&self, table: ChangeTable, user_id: &UserId) {
        let _ = self.tx.send(ChangeEvent {
            table,
            user_id: user_id.clone(),
        });
    }

    /// Invoke `on_change` whenever `table` changes for `user_id`.
    ///
    /// Must be called from within a tokio runtime. A lagging subscriber is
    /// told to refresh once rather than replayed every missed event.
    pub fn subscribe<F>(&self, table: ChangeTable, user_id: UserId, on_change: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let on_change: ChangeCallback = Arc::new(on_change);
        let mut rx = self.tx.subscribe();
        let channel = format!("{}:{}", table.table_name(), user_id);
        let mut handles = Vec::with_capacity(2);
        if let Some(remote) = &self.remote {
            handles.push(remote.listen(table, user_id.clone(), Arc::clone(&on_change)));
        }
        handles.push(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.table == table && event.user_id == user_id => on_change(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "change feed subscriber lagged");
                        on_change();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        Subscription { channel, handles }
    }
}

/// Live subscription handle. Dropping it releases the channel too.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    handles: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Channel name, `<table>:<user id>`.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn subscriber_sees_only_its_table_and_user() {
        let feed = ChangeFeed::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = feed.subscribe(ChangeTable::SubjectStats, user("u1"), move || {
            let _ = tx.send(());
        });
        assert_eq!(sub.channel(), "user_subject_stats:u1");

        feed.publish(ChangeTable::Bookmarks, &user("u1"));
        feed.publish(ChangeTable::SubjectStats, &user("u2"));
        feed.publish(ChangeTable::SubjectStats, &user("u1"));

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(got, Ok(Some(()))));
        let extra = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(extra.is_err(), "only one matching event was published");
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn unsubscribed_callback_is_not_invoked() {
        let feed = ChangeFeed::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = feed.subscribe(ChangeTable::Bookmarks, user("u1"), move || {
            let _ = tx.send(());
        });
        sub.unsubscribe();
        feed.publish(ChangeTable::Bookmarks, &user("u1"));

        // The task was aborted, so the sender is dropped and the channel closes.
        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(got, Ok(None)));
    }

    /// Fires once per listen call, then parks until aborted.
    struct OneShotRemote {
        listening: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl RemoteChanges for OneShotRemote {
        fn listen(
            &self,
            table: ChangeTable,
            _user_id: UserId,
            on_change: ChangeCallback,
        ) -> JoinHandle<()> {
            assert_eq!(table, ChangeTable::Bookmarks);
            let listening = Arc::clone(&self.listening);
            tokio::spawn(async move {
                listening.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                on_change();
                std::future::pending::<()>().await;
            })
        }
    }

    #[tokio::test]
    async fn remote_changes_reach_the_same_callback() {
        let listening = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let feed = ChangeFeed::with_remote(Arc::new(OneShotRemote {
            listening: Arc::clone(&listening),
        }));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = feed.subscribe(ChangeTable::Bookmarks, user("u1"), move || {
            let _ = tx.send(());
        });

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(got, Ok(Some(()))));
        assert_eq!(listening.load(std::sync::atomic::Ordering::SeqCst), 1);

        feed.publish(ChangeTable::Bookmarks, &user("u1"));
        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(got, Ok(Some(()))));

        // Both tasks own a sender clone; aborting them closes the channel.
        drop(sub);
        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(got, Ok(None)));
    }
}
