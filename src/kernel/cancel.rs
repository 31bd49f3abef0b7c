use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::RequestId;

/// Terminal requests kept around so late `cancel`/`state` calls still resolve.
const MAX_RETAINED: usize = 256;

/// Lifecycle of one generation request.
/// `Cancelled` and `Complete` are terminal: nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Cancelled,
    Complete,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Pending)
    }
}

#[derive(Debug)]
struct Entry {
    state: RequestState,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<RequestId, Entry>,
    retired: VecDeque<RequestId>,
}

impl Inner {
    fn retire(&mut self, id: RequestId) {
        self.retired.push_back(id);
        while self.retired.len() > MAX_RETAINED {
            if let Some(old) = self.retired.pop_front() {
                self.entries.remove(&old);
            }
        }
    }
}

/// Tracks request states and their cancellation tokens.
///
/// Cancellation is advisory: it flips the token, and stage tasks poll it
/// before delivering. Nobody is interrupted mid-call.
/// Cloning shares the same registry. The lock is only held for map updates.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new pending request and hands back its token.
    pub fn open(&self, id: RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock().entries.insert(
            id,
            Entry {
                state: RequestState::Pending,
                token: token.clone(),
            },
        );
        token
    }

    /// Pending -> Cancelled. Returns false if the request is unknown or already terminal.
    pub fn cancel(&self, id: RequestId) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&id) else {
            return false;
        };
        if entry.state.is_terminal() {
            return false;
        }
        entry.state = RequestState::Cancelled;
        entry.token.cancel();
        inner.retire(id);
        debug!("Request {} cancelled", id);
        true
    }

    /// Pending -> Complete. No-op on terminal requests.
    pub fn complete(&self, id: RequestId) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&id) else {
            return false;
        };
        if entry.state.is_terminal() {
            return false;
        }
        entry.state = RequestState::Complete;
        inner.retire(id);
        true
    }

    pub fn state(&self, id: RequestId) -> Option<RequestState> {
        self.lock().entries.get(&id).map(|e| e.state)
    }

    pub fn is_cancelled(&self, id: RequestId) -> bool {
        self.state(id) == Some(RequestState::Cancelled)
    }
}
