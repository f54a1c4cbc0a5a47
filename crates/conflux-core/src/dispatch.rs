//! Per-request dispatch and terminal notification sequencing
//!
//! Each request runs on its own worker task with no ordering guarantee
//! across requests. The dispatcher owns the sequencing contract: the
//! tracker entry is always retired (including on failure paths), a
//! cancelled request delivers neither success nor error, and a
//! non-cancelled request delivers exactly one terminal notification
//! through the event invoker.

use std::future::Future;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::invoke::EventInvoker;
use crate::sink::ErrorSink;
use crate::tracker::{RequestHandle, RequestId, RequestTracker};

/// Retires the tracker entry when the worker task finishes, on every path.
struct EndGuard {
    tracker: Arc<RequestTracker>,
    id: RequestId,
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        self.tracker.end_request(self.id);
    }
}

/// Schedules request work and sequences tracker, invoker, and sink calls.
#[derive(Clone)]
pub struct Dispatcher {
    tracker: Arc<RequestTracker>,
    invoker: EventInvoker,
}

impl Dispatcher {
    pub fn new(tracker: Arc<RequestTracker>, invoker: EventInvoker) -> Self {
        Self { tracker, invoker }
    }

    pub fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    pub fn invoker(&self) -> &EventInvoker {
        &self.invoker
    }

    /// Run `work` on an independent worker task.
    ///
    /// `work` performs the HTTP exchange with the handle's cancel token
    /// threaded into the transport. Once it resolves:
    /// - a cancelled handle discards the result, success or error, silently;
    ///   the only signal the caller ever received is the tracker's earlier
    ///   cancel notification
    /// - otherwise `deliver` runs through the event invoker with the result;
    ///   a failure inside delivery is wrapped as an event-handler error and
    ///   re-routed to the sink's error hook over the same invoker
    pub fn run<T, W, D, S>(
        &self,
        handle: RequestHandle,
        work: W,
        deliver: D,
        sink: Arc<S>,
    ) -> tokio::task::JoinHandle<()>
    where
        T: Send + 'static,
        W: Future<Output = Result<T>> + Send + 'static,
        D: FnOnce(&S, Result<T>) + Send + 'static,
        S: ErrorSink + ?Sized + 'static,
    {
        let tracker = self.tracker.clone();
        let invoker = self.invoker.clone();
        tokio::spawn(async move {
            let _guard = EndGuard {
                tracker,
                id: handle.id(),
            };

            let result = work.await;

            if handle.is_cancelled() {
                tracing::debug!(id = %handle.id(), "request cancelled, result discarded");
                return;
            }

            let delivery_sink = sink.clone();
            let delivered =
                invoker.invoke(Box::new(move || deliver(&delivery_sink, result)));

            if let Err(event_error) = delivered {
                route_error(&invoker, &sink, &event_error);
            }
        })
    }

    /// The single error channel shared by synchronous pre-flight failures
    /// and asynchronous post-dispatch failures.
    pub fn deliver_error<S>(&self, sink: &Arc<S>, error: &Error)
    where
        S: ErrorSink + ?Sized + 'static,
    {
        route_error(&self.invoker, sink, error);
    }
}

fn route_error<S>(invoker: &EventInvoker, sink: &Arc<S>, error: &Error)
where
    S: ErrorSink + ?Sized + 'static,
{
    let message = error.to_string();
    let sink = sink.clone();
    if let Err(event_error) = invoker.invoke(Box::new(move || sink.on_error(&message))) {
        tracing::warn!(error = %event_error, "error hook itself failed");
    }
}
