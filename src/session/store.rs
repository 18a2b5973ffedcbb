//! Single owner of mutable session state.
//!
//! All entity mutation goes through one `watch` channel: writers get atomic
//! check-and-set under the channel lock, readers get cheap snapshots and
//! change notifications.

use std::sync::Arc;
use tokio::sync::watch;

use crate::session::state::SessionSnapshot;

#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionStore {
    pub fn new(initial: SessionSnapshot) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Mutate unconditionally and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.tx.send_modify(f);
    }

    /// Mutate under the lock; subscribers are notified only when `f` returns true.
    ///
    /// `f` must leave the state untouched when it returns false.
    pub fn modify_if(&self, f: impl FnOnce(&mut SessionSnapshot) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionStore").field(&*self.tx.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::WalletSession;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let store = SessionStore::new(SessionSnapshot::new(Uuid::nil(), WalletSession::Disconnected));
        let mut rx = store.subscribe();

        store.update(|s| s.wallet = WalletSession::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().wallet, WalletSession::Connecting);
    }

    #[test]
    fn test_modify_if_false_does_not_notify() {
        let store = SessionStore::new(SessionSnapshot::new(Uuid::nil(), WalletSession::Absent));
        let rx = store.subscribe();

        let changed = store.modify_if(|s| s.wallet == WalletSession::Disconnected);
        assert!(!changed);
        assert!(!rx.has_changed().unwrap());
    }
}
