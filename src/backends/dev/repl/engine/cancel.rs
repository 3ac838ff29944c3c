//! Cancellation tokens and the manager that retires them on interrupt.
//!
//! Cancellation is cooperative: aborting a token never unwinds anything by
//! itself. Holders observe it by polling [`CancellationToken::is_aborted`],
//! awaiting [`CancellationToken::cancelled`], or registering an abort
//! listener.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

type AbortListener = Box<dyn FnOnce() + Send>;

/// Handle returned by [`CancellationToken::on_abort`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(u64);

struct TokenInner {
    id: u64,
    aborted: AtomicBool,
    notify: Notify,
    listeners: Mutex<Vec<(ListenerKey, AbortListener)>>,
    next_listener: AtomicU64,
}

/// A cooperative abort signal. Once aborted it stays aborted.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("id", &self.inner.id)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

impl CancellationToken {
    fn new(id: u64) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id,
                aborted: AtomicBool::new(false),
                notify: Notify::new(),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Generation number; strictly increasing per manager.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Same underlying token (clones compare equal).
    pub fn same_as(
        &self,
        other: &CancellationToken,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a listener run once when the token is aborted.
    ///
    /// Listeners run in registration order. If the token is already
    /// aborted the listener runs immediately, before this returns.
    pub fn on_abort(
        &self,
        listener: impl FnOnce() + Send + 'static,
    ) -> ListenerKey {
        let key = ListenerKey(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        {
            let mut listeners = self.inner.listeners.lock();
            if !self.is_aborted() {
                listeners.push((key, Box::new(listener)));
                return key;
            }
        }
        listener();
        key
    }

    /// Drop a listener that has not fired yet. Unknown keys are ignored.
    pub fn remove_listener(
        &self,
        key: ListenerKey,
    ) {
        self.inner.listeners.lock().retain(|(k, _)| *k != key);
    }

    /// Resolves once the token is aborted.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Returns `false` if the token was already aborted.
    fn abort(&self) -> bool {
        let listeners = {
            let mut listeners = self.inner.listeners.lock();
            if self.inner.aborted.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut *listeners)
        };

        self.inner.notify.notify_waiters();
        debug!(token = self.inner.id, listeners = listeners.len(), "token aborted");
        // Lock released: listeners may take other locks
        for (_, listener) in listeners {
            listener();
        }
        true
    }
}

/// Owns the current token and swaps it on interrupt.
#[derive(Debug, Clone)]
pub struct CancellationManager {
    current: Arc<Mutex<CancellationToken>>,
    generation: Arc<AtomicU64>,
}

impl Default for CancellationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationManager {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(CancellationToken::new(0))),
            generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Token new work should run under.
    pub fn current_token(&self) -> CancellationToken {
        self.current.lock().clone()
    }

    /// Abort the current token (if it is not already) and install a fresh
    /// one. Returns the retired token.
    pub fn interrupt(&self) -> CancellationToken {
        let fresh = CancellationToken::new(self.generation.fetch_add(1, Ordering::Relaxed));
        let retired = std::mem::replace(&mut *self.current.lock(), fresh);
        // Abort outside the lock so listeners can read the new current token
        if retired.abort() {
            debug!(retired = retired.id(), "interrupt");
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_interrupt_swaps_token() {
        let manager = CancellationManager::new();
        let before = manager.current_token();
        assert!(!before.is_aborted());

        let retired = manager.interrupt();
        assert!(retired.same_as(&before));
        assert!(before.is_aborted());

        let after = manager.current_token();
        assert!(!after.is_aborted());
        assert!(!after.same_as(&before));
        assert!(after.id() > before.id());
    }

    #[test]
    fn test_listeners_fire_once_in_order() {
        let manager = CancellationManager::new();
        let token = manager.current_token();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            token.on_abort(move || order.lock().push(i));
        }

        manager.interrupt();
        manager.interrupt();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_on_abort_after_abort_runs_immediately() {
        let manager = CancellationManager::new();
        let token = manager.current_token();
        manager.interrupt();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        token.on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_listener_does_not_fire() {
        let manager = CancellationManager::new();
        let token = manager.current_token();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let key = token.on_abort(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        token.remove_listener(key);

        manager.interrupt();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let manager = CancellationManager::new();
        let token = manager.current_token();

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        tokio::task::yield_now().await;
        manager.interrupt();

        waiter.await.unwrap();
        assert!(token.is_aborted());
    }

    #[tokio::test]
    async fn test_cancelled_returns_for_retired_token() {
        let manager = CancellationManager::new();
        let token = manager.current_token();
        manager.interrupt();
        // Must not hang
        token.cancelled().await;
    }
}
