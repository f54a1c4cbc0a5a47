//! In-flight request tracking and cooperative cancellation
//!
//! The tracker is a thread-safe registry of active operations and their
//! cancellation flags. It is constructed once by the application and passed
//! to drivers by dependency injection; there is no process-wide instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque identifier for one tracked request.
///
/// Never concurrently active twice; a value may recur after the request it
/// named has been retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Cooperative cancellation flag, threaded explicitly through the call
/// chain and checked at transport chunk boundaries.
///
/// The flag is flipped exactly once and never reverted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to one in-flight request: its id plus its cancellation token.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: RequestId,
    cancel: CancelToken,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Called whenever `cancel` or `cancel_all` fires, with the id that was
/// cancelled. Runs outside the registry lock.
pub type CancelNotifier = Arc<dyn Fn(RequestId) + Send + Sync>;

/// Thread-safe registry of in-flight operations.
///
/// The lock guards map mutation only, never I/O or notification delivery.
pub struct RequestTracker {
    active: Mutex<HashMap<RequestId, CancelToken>>,
    next_id: AtomicU64,
    notifier: Option<CancelNotifier>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            notifier: None,
        }
    }

    /// Install a cancellation notifier. The notifier fires on every
    /// `cancel`/`cancel_all`, including for ids the tracker does not know —
    /// that is the documented contract, not a defect.
    pub fn with_cancel_notifier(notifier: CancelNotifier) -> Self {
        Self {
            notifier: Some(notifier),
            ..Self::new()
        }
    }

    /// Allocate a fresh id and register it as active.
    pub fn begin_request(&self) -> (RequestId, RequestHandle) {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancelToken::new();
        let handle = RequestHandle {
            id,
            cancel: cancel.clone(),
        };
        self.active
            .lock()
            .expect("request tracker lock poisoned")
            .insert(id, cancel);
        tracing::debug!(%id, "request begun");
        (id, handle)
    }

    /// Flip the cancellation flag for `id` (no-op when unknown) and raise
    /// the cancellation notification unconditionally.
    pub fn cancel(&self, id: RequestId) {
        {
            let active = self.active.lock().expect("request tracker lock poisoned");
            if let Some(token) = active.get(&id) {
                token.cancel();
            }
        }
        tracing::debug!(%id, "cancel requested");
        if let Some(notifier) = &self.notifier {
            notifier(id);
        }
    }

    /// Cancel and notify every currently active entry.
    pub fn cancel_all(&self) {
        let ids: Vec<RequestId> = {
            let active = self.active.lock().expect("request tracker lock poisoned");
            active
                .iter()
                .map(|(id, token)| {
                    token.cancel();
                    *id
                })
                .collect()
        };
        tracing::debug!(count = ids.len(), "cancelling all active requests");
        if let Some(notifier) = &self.notifier {
            for id in ids {
                notifier(id);
            }
        }
    }

    /// Retire `id`. Idempotent: retiring an unknown id is a no-op.
    pub fn end_request(&self, id: RequestId) {
        let removed = self
            .active
            .lock()
            .expect("request tracker lock poisoned")
            .remove(&id)
            .is_some();
        if removed {
            tracing::debug!(%id, "request ended");
        }
    }

    /// Number of requests currently in flight.
    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .expect("request tracker lock poisoned")
            .len()
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}
