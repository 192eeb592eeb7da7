//! Run Loop
//!
//! A run loop is the queue that lets other threads hand work to the thread
//! that owns it. Attaching a loop registers the calling thread with a
//! [`LoopRegistry`]; from then on posted tasks pile up in the queue until the
//! owner drains them with [`RunLoop::run_pending`], [`RunLoop::run`] or
//! [`RunLoop::run_async`].
//!
//! # Lifetime
//!
//! A thread owns at most one loop at a time. The loop is not `Send`: it is
//! bound to the thread that attached it. Dropping it unregisters the thread,
//! after which posts to that thread fail with `NotAlive`. Tasks still queued
//! at that point are drained or discarded according to the loop's
//! [`ShutdownPolicy`].

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tracing::{debug, warn};

use super::config::{RunLoopConfig, ShutdownPolicy};
use super::registry::{LoopRegistry, LoopSender, Message};
use crate::error::{AttachError, PostError, SpawnError};

thread_local! {
    /// Whether this thread currently owns a run loop.
    static ATTACHED: Cell<bool> = const { Cell::new(false) };
}

/// A per-thread task queue registered with a [`LoopRegistry`].
pub struct RunLoop {
    thread: ThreadId,
    registry: Arc<LoopRegistry>,
    sender: LoopSender,
    receiver: UnboundedReceiver<Message>,
    shutdown: ShutdownPolicy,

    /// A stop request seen by `run_pending`, held for the next `run`.
    stop_pending: bool,

    /// Keeps the loop on the thread that attached it.
    _thread_bound: PhantomData<*const ()>,
}

impl RunLoop {
    /// Attach a loop with default settings to the calling thread.
    pub fn attach(registry: &Arc<LoopRegistry>) -> Result<Self, AttachError> {
        Self::attach_with(registry, &RunLoopConfig::default())
    }

    /// Attach a loop to the calling thread.
    pub fn attach_with(
        registry: &Arc<LoopRegistry>,
        config: &RunLoopConfig,
    ) -> Result<Self, AttachError> {
        let thread = std::thread::current().id();
        if ATTACHED.with(Cell::get) {
            return Err(AttachError::AlreadyAttached(thread));
        }
        ATTACHED.with(|attached| attached.set(true));

        let (sender, receiver) = mpsc::unbounded_channel();
        registry.register(thread, sender.clone());
        debug!(?thread, name = ?config.name, "run loop attached");

        Ok(Self {
            thread,
            registry: Arc::clone(registry),
            sender,
            receiver,
            shutdown: config.shutdown,
            stop_pending: false,
            _thread_bound: PhantomData,
        })
    }

    /// The thread this loop belongs to.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// A cloneable, sendable handle for posting to and stopping this loop.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            thread: self.thread,
            sender: self.sender.clone(),
        }
    }

    /// Run everything currently queued without blocking.
    ///
    /// Tasks queued by the tasks being run are picked up too. A stop request
    /// ends the drain early and is kept: the next [`run`](Self::run) or
    /// [`run_async`](Self::run_async) returns at once instead of blocking.
    /// Later calls to `run_pending` carry on with the tasks behind it.
    /// Returns the number of tasks run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Message::Run(task)) => {
                    task();
                    ran += 1;
                }
                Ok(Message::Stop) => {
                    self.stop_pending = true;
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Take a stop request left behind by `run_pending`.
    fn take_stop(&mut self) -> bool {
        std::mem::take(&mut self.stop_pending)
    }

    /// Block the thread running tasks until [`LoopHandle::stop`] is called.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`run_async`](Self::run_async) there. Returns the number of tasks run.
    pub fn run(&mut self) -> usize {
        if self.take_stop() {
            return 0;
        }
        let mut ran = 0;
        while let Some(Message::Run(task)) = self.receiver.blocking_recv() {
            task();
            ran += 1;
        }
        debug!(thread = ?self.thread, ran, "run loop stopped");
        ran
    }

    /// Async counterpart of [`run`](Self::run), for a current-thread runtime.
    pub async fn run_async(&mut self) -> usize {
        if self.take_stop() {
            return 0;
        }
        let mut ran = 0;
        while let Some(Message::Run(task)) = self.receiver.recv().await {
            task();
            ran += 1;
        }
        debug!(thread = ?self.thread, ran, "run loop stopped");
        ran
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.registry.unregister(self.thread, &self.sender);
        self.receiver.close();
        ATTACHED.with(|attached| attached.set(false));

        let mut leftover = 0;
        while let Ok(message) = self.receiver.try_recv() {
            if let Message::Run(task) = message {
                match self.shutdown {
                    ShutdownPolicy::Drain => task(),
                    ShutdownPolicy::Discard => leftover += 1,
                }
            }
        }
        if leftover > 0 {
            warn!(thread = ?self.thread, leftover, "run loop dropped queued tasks");
        }
        debug!(thread = ?self.thread, "run loop detached");
    }
}

impl std::fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLoop")
            .field("thread", &self.thread)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

/// Sendable handle to a [`RunLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    thread: ThreadId,
    sender: LoopSender,
}

impl LoopHandle {
    /// The loop's thread.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Whether the loop still accepts tasks.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a task on the loop's thread.
    pub fn post<F>(&self, task: F) -> Result<(), PostError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(task)))
            .map_err(|_| PostError::NotAlive(self.thread))
    }

    /// Ask the loop to return from `run`/`run_async` once it reaches this
    /// request. Tasks queued before the request still run first.
    pub fn stop(&self) -> Result<(), PostError> {
        self.sender
            .send(Message::Stop)
            .map_err(|_| PostError::NotAlive(self.thread))
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("thread", &self.thread)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// An OS thread dedicated to running one loop.
///
/// Dropping it stops the loop and joins the thread.
pub struct LoopThread {
    handle: LoopHandle,
    join: Option<JoinHandle<()>>,
}

impl LoopThread {
    /// Spawn a thread, attach a loop on it and start running.
    ///
    /// Waits for the new thread to report its loop. The wait does not go
    /// through tokio, so this may be called from async code too.
    pub fn spawn(registry: &Arc<LoopRegistry>, config: RunLoopConfig) -> Result<Self, SpawnError> {
        let registry = Arc::clone(registry);
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let mut builder = std::thread::Builder::new();
        if let Some(name) = &config.name {
            builder = builder.name(name.clone());
        }

        let join = builder.spawn(move || {
            let mut run_loop = match RunLoop::attach_with(&registry, &config) {
                Ok(run_loop) => run_loop,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            if ready_tx.send(Ok(run_loop.handle())).is_err() {
                return;
            }
            run_loop.run();
        })?;

        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(err)) => {
                let _ = join.join();
                return Err(err.into());
            }
            Err(_) => {
                let _ = join.join();
                return Err(SpawnError::Exited);
            }
        };

        Ok(Self {
            handle,
            join: Some(join),
        })
    }

    /// The loop's thread.
    pub fn thread(&self) -> ThreadId {
        self.handle.thread()
    }

    /// Handle to the loop.
    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    /// Stop the loop and wait for the thread to finish.
    ///
    /// Returns `Err` with the panic payload if a task panicked on the thread.
    pub fn join(mut self) -> std::thread::Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> std::thread::Result<()> {
        let _ = self.handle.stop();
        match self.join.take() {
            Some(join) => join.join(),
            None => Ok(()),
        }
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        if self.stop_and_join().is_err() {
            warn!(thread = ?self.handle.thread, "loop thread panicked");
        }
    }
}

impl std::fmt::Debug for LoopThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopThread")
            .field("handle", &self.handle)
            .finish()
    }
}
