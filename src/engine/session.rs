//! Superseding navigation per client session.
//!
//! Each request carrying a session key takes a ticket. Starting a newer
//! request for the same key bumps the session generation; older tickets
//! observe the change and their work is dropped before any result is
//! produced. Submissions take a ticket too, so they supersede older reads,
//! but the engine never drops a submission once its action is routed.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Tracks the latest request generation of every active session.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    sessions: Arc<DashMap<String, watch::Sender<u64>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `key`, superseding any in-flight request.
    pub fn begin(&self, key: &str) -> NavigationTicket {
        let entry = self
            .sessions
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(0).0);

        let mut generation = 0;
        entry.send_modify(|current| {
            *current += 1;
            generation = *current;
        });
        let receiver = entry.subscribe();
        drop(entry);

        tracing::trace!(session = %key, generation, "Navigation started");

        NavigationTicket {
            key: key.to_string(),
            generation,
            receiver,
            sessions: self.sessions.clone(),
        }
    }

    /// Number of sessions with a request in flight.
    pub fn active(&self) -> usize {
        self.sessions.len()
    }
}

/// Handle held by one in-flight request.
#[derive(Debug)]
pub struct NavigationTicket {
    key: String,
    generation: u64,
    receiver: watch::Receiver<u64>,
    sessions: Arc<DashMap<String, watch::Sender<u64>>>,
}

impl NavigationTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer request has started for this session.
    pub fn is_current(&self) -> bool {
        *self.receiver.borrow() == self.generation
    }

    /// Resolves once a newer request starts for this session.
    ///
    /// Never resolves for the latest ticket.
    pub async fn superseded(&mut self) {
        let generation = self.generation;
        let closed = self
            .receiver
            .wait_for(|current| *current != generation)
            .await
            .is_err();
        if closed {
            // sender gone: nothing can supersede this ticket any more
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for NavigationTicket {
    fn drop(&mut self) {
        let generation = self.generation;
        // only the latest request of a session removes it
        self.sessions
            .remove_if(&self.key, |_, sender| *sender.borrow() == generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_newer_request_supersedes() {
        let tracker = SessionTracker::new();
        let first = tracker.begin("s1");
        assert!(first.is_current());

        let second = tracker.begin("s1");
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_sessions_are_independent() {
        let tracker = SessionTracker::new();
        let a = tracker.begin("a");
        let _b = tracker.begin("b");
        assert!(a.is_current());
        assert_eq!(tracker.active(), 2);
    }

    #[test]
    fn test_latest_ticket_cleans_up() {
        let tracker = SessionTracker::new();
        let first = tracker.begin("s1");
        let second = tracker.begin("s1");
        drop(second);
        assert_eq!(tracker.active(), 0);
        // a stale ticket leaves nothing behind either
        drop(first);
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn test_superseded_wakes_older_ticket() {
        let tracker = SessionTracker::new();
        let mut first = tracker.begin("s1");

        let waiter = tokio::spawn(async move {
            first.superseded().await;
            first.is_current()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _second = tracker.begin("s1");

        let still_current = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!still_current);
    }

    #[tokio::test]
    async fn test_latest_ticket_never_superseded() {
        let tracker = SessionTracker::new();
        let mut ticket = tracker.begin("s1");
        let waited = tokio::time::timeout(Duration::from_millis(30), ticket.superseded()).await;
        assert!(waited.is_err());
    }
}
