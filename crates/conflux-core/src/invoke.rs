//! Callback delivery with explicit thread-affinity policy
//!
//! Some integrations require callbacks to run on one designated thread
//! (UI frameworks, FFI hosts). The policy is explicit data here: the
//! application injects either an [`InlineExecutor`] or an
//! [`AffinityExecutor`] when it constructs the invoker, instead of the
//! invoker consulting ambient thread identity plus a toggle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::error::{Error, Result};

/// A callback invocation handed to an executor.
pub type Proc = Box<dyn FnOnce() + Send>;

/// Where and how a callback runs.
pub trait CallbackExecutor: Send + Sync {
    /// Run `proc` to completion before returning. A panic inside `proc` is
    /// captured and surfaced as an [`Error::EventHandler`], never swallowed
    /// and never allowed to unwind into the caller.
    fn execute(&self, proc: Proc) -> Result<()>;
}

/// Runs the callback inline on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, proc: Proc) -> Result<()> {
        run_guarded(proc)
    }
}

type Job = (Proc, mpsc::SyncSender<Result<()>>);

/// Marshals callbacks onto one dedicated affinity thread, blocking the
/// caller until the callback has run there. Calls made from the affinity
/// thread itself run inline to avoid self-deadlock.
pub struct AffinityExecutor {
    sender: Mutex<mpsc::Sender<Job>>,
    affinity_thread: ThreadId,
}

impl AffinityExecutor {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let (id_tx, id_rx) = mpsc::channel();
        thread::Builder::new()
            .name("conflux-affinity".to_string())
            .spawn(move || {
                let _ = id_tx.send(thread::current().id());
                for (proc, done) in rx {
                    let _ = done.send(run_guarded(proc));
                }
            })
            .map_err(|e| Error::Configuration {
                message: format!("failed to spawn affinity thread: {e}"),
            })?;
        let affinity_thread = id_rx.recv().map_err(|_| Error::Configuration {
            message: "affinity thread exited during startup".to_string(),
        })?;
        Ok(Self {
            sender: Mutex::new(tx),
            affinity_thread,
        })
    }
}

impl CallbackExecutor for AffinityExecutor {
    fn execute(&self, proc: Proc) -> Result<()> {
        if thread::current().id() == self.affinity_thread {
            return run_guarded(proc);
        }
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        {
            let sender = self.sender.lock().expect("affinity sender lock poisoned");
            sender.send((proc, done_tx)).map_err(|_| Error::EventHandler {
                message: "affinity thread is gone".to_string(),
            })?;
        }
        done_rx.recv().map_err(|_| Error::EventHandler {
            message: "affinity thread dropped the callback".to_string(),
        })?
    }
}

fn run_guarded(proc: Proc) -> Result<()> {
    catch_unwind(AssertUnwindSafe(proc)).map_err(|payload| {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "event handler panicked".to_string()
        };
        tracing::warn!(%message, "event handler failed");
        Error::EventHandler { message }
    })
}

/// Delivers callback invocations through the injected executor.
#[derive(Clone)]
pub struct EventInvoker {
    executor: Arc<dyn CallbackExecutor>,
}

impl EventInvoker {
    pub fn new(executor: Arc<dyn CallbackExecutor>) -> Self {
        Self { executor }
    }

    /// Inline delivery on the calling thread.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineExecutor))
    }

    /// Delivery marshaled to a dedicated affinity thread. Fails when the
    /// thread cannot be spawned.
    pub fn with_affinity() -> Result<Self> {
        Ok(Self::new(Arc::new(AffinityExecutor::new()?)))
    }

    pub fn invoke(&self, proc: Proc) -> Result<()> {
        self.executor.execute(proc)
    }
}
