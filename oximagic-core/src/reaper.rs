//! Background release of resources whose owner vanished without closing them.
//!
//! Streams that hold operating system resources (file handles, temporary
//! files) close them explicitly in [`SeekableStream::close`]. The reaper is
//! the safety net for owners that are dropped without that call: the owner
//! holds a [`Registration`], and dropping an armed registration hands the
//! cleanup to a single background worker, which runs it exactly once and
//! logs (never propagates) any failure.
//!
//! The service is an explicit object behind the [`Reaper`] capability trait,
//! so tests can inject [`NoopReaper`].
//!
//! [`SeekableStream::close`]: crate::stream::SeekableStream::close
//!
//! # Example
//!
//! ```
//! use oximagic_core::reaper::{Reclaimable, Registration, ResourceReaper};
//!
//! let reaper = ResourceReaper::spawn().unwrap();
//! let handle = Reclaimable::new(vec![1u8, 2, 3]);
//! let registration = Registration::new(reaper.clone(), handle.cleanup(|_| Ok(())));
//! assert_eq!(reaper.pending(), 1);
//!
//! drop(registration);
//! reaper.wait_idle();
//! assert!(handle.is_released());
//! ```

use crate::error::{OxiMagicError, Result};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// A deferred release action.
pub type Cleanup = Box<dyn FnOnce() -> io::Result<()> + Send + 'static>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

/// Capability to track resources and release them on the owner's behalf.
pub trait Reaper: Send + Sync + fmt::Debug {
    /// Track `cleanup` until it is unregistered or released.
    fn register(&self, cleanup: Cleanup) -> Token;

    /// Stop tracking `token` and hand its cleanup back to the caller.
    ///
    /// Called from an owner's explicit close.
    fn unregister(&self, token: Token) -> Option<Cleanup>;

    /// The owner of `token` is gone: run its cleanup, best-effort.
    fn release(&self, token: Token);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a cleanup, logging failures and panics.
fn run_cleanup(token: Token, cleanup: Cleanup) {
    match panic::catch_unwind(AssertUnwindSafe(cleanup)) {
        Ok(Ok(())) => tracing::debug!(token = token.0, "released abandoned resource"),
        Ok(Err(e)) => {
            tracing::warn!(token = token.0, error = %e, "failed to release abandoned resource")
        }
        Err(_) => tracing::warn!(token = token.0, "cleanup panicked while releasing resource"),
    }
}

enum Message {
    Reap(Token),
    Barrier(SyncSender<()>),
}

#[derive(Default)]
struct Registry {
    pending: Mutex<HashMap<u64, Cleanup>>,
    reaped: AtomicU64,
}

impl Registry {
    fn take(&self, token: Token) -> Option<Cleanup> {
        lock(&self.pending).remove(&token.0)
    }

    fn reap(&self, token: Token) {
        if let Some(cleanup) = self.take(token) {
            run_cleanup(token, cleanup);
            self.reaped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// The background reaper service: one worker thread per instance.
pub struct ResourceReaper {
    registry: Arc<Registry>,
    next_token: AtomicU64,
    sender: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceReaper {
    /// Start the worker thread.
    pub fn spawn() -> Result<Arc<Self>> {
        let registry = Arc::new(Registry::default());
        let (sender, receiver) = mpsc::channel::<Message>();

        let worker_registry = Arc::clone(&registry);
        let worker = thread::Builder::new()
            .name("oximagic-reaper".into())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Reap(token) => worker_registry.reap(token),
                        Message::Barrier(reply) => {
                            let _ = reply.send(());
                        }
                    }
                }
            })
            .map_err(OxiMagicError::Io)?;

        Ok(Arc::new(Self {
            registry,
            next_token: AtomicU64::new(1),
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Number of registrations still tracked.
    pub fn pending(&self) -> usize {
        lock(&self.registry.pending).len()
    }

    /// Number of cleanups the worker has run.
    pub fn reaped(&self) -> u64 {
        self.registry.reaped.load(Ordering::Relaxed)
    }

    /// Block until every release queued so far has been processed.
    pub fn wait_idle(&self) {
        let (reply, done) = mpsc::sync_channel(1);
        let sent = lock(&self.sender)
            .as_ref()
            .is_some_and(|sender| sender.send(Message::Barrier(reply)).is_ok());
        if sent {
            let _ = done.recv();
        }
    }

    /// Stop the worker after it drains its queue.
    ///
    /// Releases arriving afterwards run on the caller's thread.
    pub fn shutdown(&self) {
        drop(lock(&self.sender).take());
        if let Some(worker) = lock(&self.worker).take() {
            if worker.join().is_err() {
                tracing::warn!("reaper worker terminated abnormally");
            }
        }
    }
}

impl Reaper for ResourceReaper {
    fn register(&self, cleanup: Cleanup) -> Token {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.registry.pending).insert(token.0, cleanup);
        token
    }

    fn unregister(&self, token: Token) -> Option<Cleanup> {
        self.registry.take(token)
    }

    fn release(&self, token: Token) {
        let queued = lock(&self.sender)
            .as_ref()
            .is_some_and(|sender| sender.send(Message::Reap(token)).is_ok());
        if !queued {
            self.registry.reap(token);
        }
    }
}

impl fmt::Debug for ResourceReaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceReaper")
            .field("pending", &self.pending())
            .field("reaped", &self.reaped())
            .finish()
    }
}

impl Drop for ResourceReaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A reaper that tracks nothing. Cleanups handed to it are dropped unrun.
#[derive(Debug, Default)]
pub struct NoopReaper {
    next_token: AtomicU64,
}

impl NoopReaper {
    /// Create a shared no-op reaper.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Reaper for NoopReaper {
    fn register(&self, _cleanup: Cleanup) -> Token {
        Token(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    fn unregister(&self, _token: Token) -> Option<Cleanup> {
        None
    }

    fn release(&self, _token: Token) {}
}

/// An armed registration. Dropping it releases the tracked resource.
#[derive(Debug)]
pub struct Registration {
    reaper: Arc<dyn Reaper>,
    token: Option<Token>,
}

impl Registration {
    /// Register `cleanup` with `reaper`.
    pub fn new(reaper: Arc<dyn Reaper>, cleanup: Cleanup) -> Self {
        let token = reaper.register(cleanup);
        Self {
            reaper,
            token: Some(token),
        }
    }

    /// Token of this registration.
    pub fn token(&self) -> Option<Token> {
        self.token
    }

    /// Disarm, returning the cleanup for the owner to run itself.
    pub fn cancel(mut self) -> Option<Cleanup> {
        let token = self.token.take()?;
        self.reaper.unregister(token)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.reaper.release(token);
        }
    }
}

/// A resource shared between its owner and a pending [`Cleanup`].
///
/// Whoever takes the value first (the owner on close, or the reaper) releases
/// it; the other side then finds the slot empty.
#[derive(Debug)]
pub struct Reclaimable<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T: Send + 'static> Reclaimable<T> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value))),
        }
    }

    /// Run `f` against the resource.
    ///
    /// # Errors
    ///
    /// Returns [`OxiMagicError::Closed`] once the resource was released.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut guard = lock(&self.slot);
        guard.as_mut().map(f).ok_or(OxiMagicError::Closed)
    }

    /// Take the resource out, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        lock(&self.slot).take()
    }

    /// Whether the resource has been taken.
    pub fn is_released(&self) -> bool {
        lock(&self.slot).is_none()
    }

    /// Build a cleanup that takes the resource and passes it to `release`.
    pub fn cleanup<F>(&self, release: F) -> Cleanup
    where
        F: FnOnce(T) -> io::Result<()> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        Box::new(move || match lock(&slot).take() {
            Some(value) => release(value),
            None => Ok(()),
        })
    }
}
