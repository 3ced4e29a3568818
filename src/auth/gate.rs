// Single-flight refresh gate
//
// Holds the refreshing flag, the FIFO queue of requests waiting on the
// in-flight refresh and the outcome of the last failed refresh. All
// transitions happen under one lock, so two callers can never both become
// the refresher for the same expiry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

use super::store::CredentialStore;
use super::types::ACCESS_TOKEN_KEY;
use crate::error::{RefreshError, Result};

/// Outcome shared with every waiter of a refresh
pub type RefreshOutcome = std::result::Result<String, RefreshError>;

#[derive(Default)]
struct GateState {
    refreshing: bool,
    next_ticket: u64,
    waiters: VecDeque<(u64, oneshot::Sender<RefreshOutcome>)>,
    /// Token whose refresh failed, with the error every late 401 for it gets
    failed: Option<(String, RefreshError)>,
}

/// What a caller holding a rejected request should do next
pub enum Entry {
    /// Caller performs the refresh and must settle the lease
    Lead(RefreshLease),
    /// A refresh is already in flight; wait for its outcome
    Wait(Waiter),
    /// Credentials changed since the request was sent; replay with this token
    Replay(String),
    /// The refresh for the token this request carried already failed
    Failed(RefreshError),
}

#[derive(Clone, Default)]
pub struct RefreshGate {
    state: Arc<Mutex<GateState>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide how to recover a request that was rejected with 401.
    ///
    /// `sent_token` is the access token the request carried, `current_token`
    /// what the credential store holds now.
    pub fn enter(&self, sent_token: Option<&str>, current_token: Option<&str>) -> Entry {
        let mut state = self.lock();
        self.decide(&mut state, sent_token, current_token)
    }

    /// Like [`enter`](Self::enter), reading the current token from `store`
    /// while the gate is locked. A leader writes the store before it
    /// settles, so the read can never observe a refresh half-done.
    pub fn enter_with_store(
        &self,
        sent_token: Option<&str>,
        store: &dyn CredentialStore,
    ) -> Result<Entry> {
        let mut state = self.lock();
        if state.refreshing {
            return Ok(self.decide(&mut state, sent_token, None));
        }

        let current = store.get(ACCESS_TOKEN_KEY)?;
        Ok(self.decide(&mut state, sent_token, current.as_deref()))
    }

    fn decide(
        &self,
        state: &mut GateState,
        sent_token: Option<&str>,
        current_token: Option<&str>,
    ) -> Entry {
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back((ticket, tx));
            return Entry::Wait(Waiter { ticket, rx });
        }

        if let Some(current) = current_token {
            if sent_token != Some(current) {
                return Entry::Replay(current.to_string());
            }
        }

        if let (Some(sent), Some((failed, err))) = (sent_token, state.failed.as_ref()) {
            if sent == failed && current_token != Some(sent) {
                return Entry::Failed(err.clone());
            }
        }

        state.refreshing = true;
        Entry::Lead(RefreshLease {
            gate: self.clone(),
            replacing: sent_token.map(str::to_string),
            settled: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of requests waiting on the current refresh
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Leave the refreshing state and hand `outcome` to every waiter in
    /// queue order. Returns the released tickets, in release order.
    fn release(&self, outcome: RefreshOutcome, replacing: Option<String>) -> Vec<u64> {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            state.failed = match (&outcome, replacing) {
                (Ok(_), _) => None,
                // Abandoned refreshes may be retried by the next 401
                (Err(RefreshError::Abandoned), _) => state.failed.take(),
                (Err(err), Some(token)) => Some((token, err.clone())),
                (Err(_), None) => state.failed.take(),
            };
            std::mem::take(&mut state.waiters)
        };

        let mut released = Vec::with_capacity(waiters.len());
        for (ticket, tx) in waiters {
            // A waiter that stopped listening has nothing left to resume
            let _ = tx.send(outcome.clone());
            released.push(ticket);
        }
        released
    }
}

/// Exclusive right to run the refresh.
///
/// Dropping an unsettled lease rejects every waiter with
/// [`RefreshError::Abandoned`] and clears the refreshing flag.
pub struct RefreshLease {
    gate: RefreshGate,
    /// Access token the refresh replaces
    replacing: Option<String>,
    settled: bool,
}

impl RefreshLease {
    /// Release all queued requests with the refresh outcome.
    /// A failure is remembered for the token being replaced, so 401s for
    /// that token arriving later get the same error without a new refresh.
    pub fn settle(mut self, outcome: RefreshOutcome) -> Vec<u64> {
        self.settled = true;
        let replacing = self.replacing.take();
        self.gate.release(outcome, replacing)
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh dropped before settling, rejecting queued requests");
            self.gate.release(Err(RefreshError::Abandoned), None);
        }
    }
}

/// A request parked behind the in-flight refresh
pub struct Waiter {
    ticket: u64,
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl Waiter {
    /// Position in arrival order across the gate's lifetime
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub async fn wait(self) -> RefreshOutcome {
        self.rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    /// Wait with an optional upper bound; `None` waits until the refresh settles
    pub async fn wait_timeout(self, timeout: Option<Duration>) -> RefreshOutcome {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait())
                .await
                .unwrap_or(Err(RefreshError::TimedOut)),
            None => self.wait().await,
        }
    }
}
