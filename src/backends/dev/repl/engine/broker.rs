//! Interactive request broker.
//!
//! Evaluation code asks for a line of user input through
//! [`ReadlineBroker::request`]. The UI surface can only show one prompt at a
//! time, so requests wait in a FIFO queue and only the head is *active*.
//! The UI watches the active slot and answers it with
//! [`ReadlineBroker::answer`].

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tracing::{debug, trace};

use super::cancel::{CancellationToken, ListenerKey};

/// Identifier of a readline request, unique per broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// What the UI shows for the active request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRequest {
    pub id: RequestId,
    pub prompt: String,
}

/// Why a readline request did not produce a line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadlineError {
    #[error("readline cancelled")]
    Cancelled,
    #[error("readline broker shut down")]
    Closed,
}

/// Errors reported to the UI side.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("no readline request is waiting for an answer")]
    NoActiveRequest,
}

type Responder = oneshot::Sender<Result<String, ReadlineError>>;

struct PendingRequest {
    id: RequestId,
    prompt: String,
    token: CancellationToken,
    listener: Option<ListenerKey>,
    responder: Responder,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<PendingRequest>,
    /// Id of the queue head once it has been shown to the UI
    active: Option<RequestId>,
    next_id: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    active_tx: watch::Sender<Option<ActiveRequest>>,
}

/// Serializes nested readline requests against a single-slot UI.
#[derive(Clone)]
pub struct ReadlineBroker {
    shared: Arc<Shared>,
}

impl Default for ReadlineBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadlineBroker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ReadlineBroker")
            .field("queued", &state.queue.len())
            .field("active", &state.active)
            .finish()
    }
}

impl ReadlineBroker {
    pub fn new() -> Self {
        let (active_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                active_tx,
            }),
        }
    }

    /// Ask the user for a line of input.
    ///
    /// Fails with [`ReadlineError::Cancelled`] right away if `token` is
    /// already aborted, or later if it is aborted while the request waits.
    pub async fn request(
        &self,
        prompt: impl Into<String>,
        token: &CancellationToken,
    ) -> Result<String, ReadlineError> {
        if token.is_aborted() {
            return Err(ReadlineError::Cancelled);
        }

        let prompt = prompt.into();
        let (responder, receiver) = oneshot::channel();
        let id = {
            let mut state = self.shared.state.lock();
            let id = RequestId(state.next_id);
            state.next_id += 1;
            state.queue.push_back(PendingRequest {
                id,
                prompt,
                token: token.clone(),
                listener: None,
                responder,
            });
            id
        };
        trace!(?id, "readline request queued");

        // May fire immediately if the token was aborted after the check above
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let key = token.on_abort(move || {
            if let Some(shared) = weak.upgrade() {
                Shared::reject(&shared, id);
            }
        });
        {
            let mut state = self.shared.state.lock();
            if let Some(pending) = state.queue.iter_mut().find(|p| p.id == id) {
                pending.listener = Some(key);
            }
        }

        Shared::activate_head(&self.shared);

        let _withdraw = Withdraw {
            shared: &self.shared,
            id,
        };
        receiver.await.unwrap_or(Err(ReadlineError::Closed))
    }

    /// Resolve the active request with `text` and move on to the next one.
    pub fn answer(
        &self,
        text: impl Into<String>,
    ) -> Result<(), BrokerError> {
        let pending = {
            let mut state = self.shared.state.lock();
            let Some(active) = state.active else {
                return Err(BrokerError::NoActiveRequest);
            };
            state.active = None;
            match state.queue.front() {
                Some(head) if head.id == active => state.queue.pop_front(),
                _ => None,
            }
        };
        let Some(pending) = pending else {
            return Err(BrokerError::NoActiveRequest);
        };

        if let Some(key) = pending.listener {
            pending.token.remove_listener(key);
        }
        debug!(id = ?pending.id, "readline answered");
        // Settle before the next request becomes visible
        let _ = pending.responder.send(Ok(text.into()));
        self.shared.active_tx.send_replace(None);

        Shared::activate_head(&self.shared);
        Ok(())
    }

    /// Request currently shown to the user, if any.
    pub fn active(&self) -> Option<ActiveRequest> {
        self.shared.active_tx.borrow().clone()
    }

    /// Watch the active slot. The value is `None` between requests.
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveRequest>> {
        self.shared.active_tx.subscribe()
    }

    /// Requests waiting or active.
    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }
}

/// Pulls a request out of the queue when the waiting future is dropped.
struct Withdraw<'a> {
    shared: &'a Arc<Shared>,
    id: RequestId,
}

impl Drop for Withdraw<'_> {
    fn drop(&mut self) {
        let Some((pending, was_active)) = Shared::take(self.shared, self.id) else {
            return;
        };
        trace!(id = ?self.id, "readline request withdrawn");
        if let Some(key) = pending.listener {
            pending.token.remove_listener(key);
        }
        if was_active {
            self.shared.active_tx.send_replace(None);
        }
        Shared::activate_head(self.shared);
    }
}

impl Shared {
    /// Remove a request from the queue, clearing the active slot if it held it.
    fn take(
        shared: &Arc<Shared>,
        id: RequestId,
    ) -> Option<(PendingRequest, bool)> {
        let mut state = shared.state.lock();
        let index = state.queue.iter().position(|p| p.id == id)?;
        let was_active = state.active == Some(id);
        if was_active {
            state.active = None;
        }
        state.queue.remove(index).map(|pending| (pending, was_active))
    }

    /// Reject one request after its token was aborted.
    fn reject(
        shared: &Arc<Shared>,
        id: RequestId,
    ) {
        let Some((pending, was_active)) = Shared::take(shared, id) else {
            return;
        };
        debug!(?id, was_active, "readline cancelled");
        let _ = pending.responder.send(Err(ReadlineError::Cancelled));
        if was_active {
            shared.active_tx.send_replace(None);
        }
        // A head skipped for its aborted token may have been this one
        Shared::activate_head(shared);
    }

    /// Expose the queue head if nothing is active (check-then-set).
    ///
    /// A head whose token is already aborted stays hidden; its own abort
    /// listener removes it and activates the next one.
    fn activate_head(shared: &Arc<Shared>) {
        let next = {
            let mut state = shared.state.lock();
            if state.active.is_some() {
                return;
            }
            let Some(head) = state.queue.front() else {
                return;
            };
            if head.token.is_aborted() {
                trace!(id = ?head.id, "skipping aborted readline request");
                return;
            }
            let next = ActiveRequest {
                id: head.id,
                prompt: head.prompt.clone(),
            };
            state.active = Some(head.id);
            next
        };
        trace!(id = ?next.id, "readline request active");
        shared.active_tx.send_replace(Some(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dev::repl::engine::cancel::CancellationManager;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_aborted_token_rejects_immediately() {
        let broker = ReadlineBroker::new();
        let manager = CancellationManager::new();
        let token = manager.current_token();
        manager.interrupt();

        let mut request = task::spawn(broker.request("name? ", &token));
        assert_eq!(assert_ready!(request.poll()), Err(ReadlineError::Cancelled));
        assert_eq!(broker.pending_len(), 0);
        assert!(broker.active().is_none());
    }

    #[test]
    fn test_answer_resolves_active_request() {
        let broker = ReadlineBroker::new();
        let token = CancellationManager::new().current_token();

        let mut request = task::spawn(broker.request("name? ", &token));
        assert_pending!(request.poll());
        let active = broker.active().expect("request should be active");
        assert_eq!(active.prompt, "name? ");

        broker.answer("ada").unwrap();
        assert!(request.is_woken());
        assert_eq!(assert_ready!(request.poll()), Ok("ada".to_string()));
        assert!(broker.active().is_none());
    }

    #[test]
    fn test_queue_is_fifo_and_single_slot() {
        let broker = ReadlineBroker::new();
        let token = CancellationManager::new().current_token();

        let mut first = task::spawn(broker.request("first ", &token));
        let mut second = task::spawn(broker.request("second ", &token));
        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_eq!(broker.pending_len(), 2);
        assert_eq!(broker.active().unwrap().prompt, "first ");

        broker.answer("1").unwrap();
        // First settled before second is exposed
        assert_eq!(assert_ready!(first.poll()), Ok("1".to_string()));
        assert_eq!(broker.active().unwrap().prompt, "second ");
        assert_pending!(second.poll());

        broker.answer("2").unwrap();
        assert_eq!(assert_ready!(second.poll()), Ok("2".to_string()));
        assert_eq!(broker.pending_len(), 0);
    }

    #[test]
    fn test_dropped_request_is_withdrawn() {
        let broker = ReadlineBroker::new();
        let token = CancellationManager::new().current_token();

        let mut abandoned = task::spawn(broker.request("gone ", &token));
        let mut next = task::spawn(broker.request("next ", &token));
        assert_pending!(abandoned.poll());
        assert_pending!(next.poll());

        drop(abandoned);
        assert_eq!(broker.pending_len(), 1);
        assert_eq!(broker.active().unwrap().prompt, "next ");
    }

    #[test]
    fn test_answer_without_active_is_error() {
        let broker = ReadlineBroker::new();
        assert_eq!(broker.answer("x"), Err(BrokerError::NoActiveRequest));
    }

    #[test]
    fn test_abort_only_rejects_matching_token() {
        let broker = ReadlineBroker::new();
        let manager = CancellationManager::new();
        let old = manager.current_token();

        let mut doomed = task::spawn(broker.request("old ", &old));
        assert_pending!(doomed.poll());

        manager.interrupt();
        let fresh = manager.current_token();
        let mut survivor = task::spawn(broker.request("new ", &fresh));
        assert_pending!(survivor.poll());

        assert_eq!(assert_ready!(doomed.poll()), Err(ReadlineError::Cancelled));
        assert_eq!(broker.active().unwrap().prompt, "new ");
        broker.answer("ok").unwrap();
        assert_eq!(assert_ready!(survivor.poll()), Ok("ok".to_string()));
    }

    #[test]
    fn test_abort_of_active_advances_to_other_token() {
        let broker = ReadlineBroker::new();
        let first_manager = CancellationManager::new();
        let second_manager = CancellationManager::new();
        let a = first_manager.current_token();
        let b = second_manager.current_token();

        let mut on_a = task::spawn(broker.request("a ", &a));
        let mut on_b = task::spawn(broker.request("b ", &b));
        assert_pending!(on_a.poll());
        assert_pending!(on_b.poll());
        assert_eq!(broker.active().unwrap().prompt, "a ");

        first_manager.interrupt();
        assert_eq!(assert_ready!(on_a.poll()), Err(ReadlineError::Cancelled));
        assert_eq!(broker.active().unwrap().prompt, "b ");
        assert_pending!(on_b.poll());
    }

    #[test]
    fn test_interrupt_never_exposes_doomed_requests() {
        let broker = ReadlineBroker::new();
        let manager = CancellationManager::new();
        let token = manager.current_token();

        let mut first = task::spawn(broker.request("first ", &token));
        assert_pending!(first.poll());

        // Runs between the first request's rejection and the second's
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let broker = broker.clone();
            let seen = Arc::clone(&seen);
            token.on_abort(move || seen.lock().push(broker.active()));
        }

        let mut second = task::spawn(broker.request("second ", &token));
        let mut third = task::spawn(broker.request("third ", &token));
        assert_pending!(second.poll());
        assert_pending!(third.poll());

        manager.interrupt();
        assert_eq!(seen.lock().as_slice(), [None]);
        assert!(broker.active().is_none());
        for request in [&mut first, &mut second, &mut third] {
            assert_eq!(assert_ready!(request.poll()), Err(ReadlineError::Cancelled));
        }

        // The queue still advances for requests under the fresh token
        let fresh = manager.current_token();
        let mut next = task::spawn(broker.request("next ", &fresh));
        assert_pending!(next.poll());
        assert_eq!(broker.active().unwrap().prompt, "next ");
    }

    #[tokio::test]
    async fn test_interrupt_rejects_queued_requests_in_fifo_order() {
        let broker = ReadlineBroker::new();
        let manager = CancellationManager::new();
        let token = manager.current_token();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        for i in 0..4 {
            let broker = broker.clone();
            let token = token.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = broker.request(format!("q{} ", i), &token).await;
                let _ = tx.send((i, outcome));
            });
        }
        while broker.pending_len() < 4 {
            tokio::task::yield_now().await;
        }

        let retired = manager.interrupt();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let (i, outcome) = rx.recv().await.unwrap();
            assert_eq!(outcome, Err(ReadlineError::Cancelled));
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(broker.pending_len(), 0);
        assert!(broker.active().is_none());

        // Second interrupt retires the fresh token, the old one stays retired
        let again = manager.interrupt();
        assert!(!again.same_as(&retired));
        assert!(retired.is_aborted());
    }
}
