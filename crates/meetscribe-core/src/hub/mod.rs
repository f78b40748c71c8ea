//! Broadcast Hub: fan out `ProgressEvent`s from many producers (Tracker
//! instances) to many attached sessions, with per-session de-duplication.
//!
//! Every attached session receives every published event — a global
//! channel. `subscribe`/`unsubscribe` track per-file interest for the WS
//! handshake (`{type:"subscribe", file_id}` -> `{type:"subscribed"}`) but
//! do not gate delivery — see `DESIGN.md` for why this design was chosen.
//! Delivery is best-effort: a session with a full outbound queue drops the
//! event rather than back-pressuring the publisher.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use crate::domain::{FileId, FileState, ProgressEvent};

/// Bound on each session's outbound queue. A full queue causes the publish
/// to drop for that session only.
const SESSION_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Session {
    tx: tokio::sync::mpsc::Sender<ProgressEvent>,
    subscriptions: Mutex<HashSet<FileId>>,
    last_seen: Mutex<HashMap<FileId, (u8, FileState)>>,
}

#[derive(Default)]
pub struct Hub {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

/// Implemented by the Hub; lets the Tracker depend on a narrow trait rather
/// than the whole Hub API.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new session, returning its id and the receiving half of its
    /// outbound channel. Always creates a fresh session, so repeated calls
    /// are naturally side-effect-isolated (idempotent with respect to any
    /// single id, since ids are minted here).
    pub fn attach(&self) -> (SessionId, tokio::sync::mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(SESSION_QUEUE_CAPACITY);
        let id = SessionId::new();
        let session = Session {
            tx,
            subscriptions: Mutex::new(HashSet::new()),
            last_seen: Mutex::new(HashMap::new()),
        };
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, session);
        (id, rx)
    }

    /// Idempotent: detaching an unknown or already-detached id is a no-op.
    /// Dropping the session's sender releases any pending sends.
    pub fn detach(&self, id: SessionId) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    pub fn subscribe(&self, id: SessionId, file_id: FileId) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let Some(session) = sessions.get(&id) else {
            return false;
        };
        session
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(file_id);
        true
    }

    pub fn unsubscribe(&self, id: SessionId, file_id: FileId) {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get(&id) {
            session
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&file_id);
        }
    }

    /// Deliver `event` to every attached session, applying per-session
    /// per-file de-duplication. Non-blocking: a full session queue drops the
    /// event for that session only.
    pub fn publish(&self, event: ProgressEvent) {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        for session in sessions.values() {
            if !should_deliver(session, &event) {
                continue;
            }
            if let Err(err) = session.tx.try_send(event.clone()) {
                tracing::debug!(
                    target: "meetscribe.hub",
                    file_id = %event.file_id,
                    reason = %err,
                    "dropped progress event for a session"
                );
            }
        }
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A dropped event must not leave the session desynchronised: the next
/// accepted event re-synchronises `last_seen`, so we only update it when
/// the event is actually accepted for delivery.
fn should_deliver(session: &Session, event: &ProgressEvent) -> bool {
    let mut last_seen = session.last_seen.lock().unwrap_or_else(|e| e.into_inner());
    let accept = match last_seen.get(&event.file_id) {
        Some(&(progress, state)) => event.progress > progress || event.state != state,
        None => true,
    };
    if accept {
        last_seen.insert(event.file_id, (event.progress, event.state));
    }
    accept
}

impl EventSink for Hub {
    fn publish(&self, event: ProgressEvent) {
        Self::publish(self, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileId;

    fn event(file_id: FileId, progress: u8, state: FileState) -> ProgressEvent {
        ProgressEvent {
            file_id,
            state,
            progress,
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn attach_then_publish_is_received() {
        let hub = Hub::new();
        let (id, mut rx) = hub.attach();
        let file_id = FileId::new();
        hub.publish(event(file_id, 10, FileState::Processing));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.progress, 10);
        hub.detach(id);
    }

    #[tokio::test]
    async fn duplicate_progress_and_state_is_suppressed() {
        let hub = Hub::new();
        let (_id, mut rx) = hub.attach();
        let file_id = FileId::new();
        hub.publish(event(file_id, 10, FileState::Processing));
        hub.publish(event(file_id, 10, FileState::Processing));
        hub.publish(event(file_id, 20, FileState::Processing));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.progress, 10);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.progress, 20);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn regression_is_suppressed_unless_state_changes() {
        let hub = Hub::new();
        let (_id, mut rx) = hub.attach();
        let file_id = FileId::new();
        hub.publish(event(file_id, 50, FileState::Processing));
        hub.publish(event(file_id, 30, FileState::Processing)); // dropped
        hub.publish(event(file_id, 0, FileState::Uploaded)); // state changed, delivered

        let first = rx.recv().await.unwrap();
        assert_eq!(first.progress, 50);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.state, FileState::Uploaded);
    }

    #[tokio::test]
    async fn detach_is_idempotent() {
        let hub = Hub::new();
        let (id, _rx) = hub.attach();
        hub.detach(id);
        hub.detach(id);
        assert_eq!(hub.session_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_before_publish_guarantees_first_event_delivery() {
        let hub = Hub::new();
        let (id, mut rx) = hub.attach();
        let file_id = FileId::new();
        assert!(hub.subscribe(id, file_id));
        hub.publish(event(file_id, 1, FileState::Processing));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.progress, 1);
    }
}
