//! Duty-cycle agents and the thread that runs them.

use super::channel::OutboundChannel;
use super::error::{ReaderError, WriterError};
use super::reader::{FeedGateway, SocketReader};
use super::writer::{FrameSink, SocketWriter};
use crate::book::Book;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// A unit of work polled in a loop on its own thread.
pub trait Agent: Send + 'static {
    /// Error returned by the lifecycle hooks.
    type Error: std::error::Error + Send + 'static;

    /// Name used for the thread and in logs.
    fn role_name(&self) -> &str;

    /// Called once on the agent thread before the first duty cycle.
    ///
    /// # Errors
    /// An error here stops the agent before it runs.
    fn on_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// One duty cycle. Returns how much work was done; zero lets the runner
    /// yield the thread.
    ///
    /// # Errors
    /// Fatal errors (see [`Agent::is_fatal`]) stop the agent; others are
    /// logged and the loop continues.
    fn do_work(&mut self) -> Result<usize, Self::Error>;

    /// Called once on the agent thread after the last duty cycle.
    fn on_close(&mut self) {}

    /// Whether `error` ends the agent.
    fn is_fatal(&self, _error: &Self::Error) -> bool {
        true
    }
}

impl<G, B, C> Agent for SocketReader<G, B, C>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
{
    type Error = ReaderError;

    fn role_name(&self) -> &str {
        "socket-reader"
    }

    #[inline]
    fn do_work(&mut self) -> Result<usize, ReaderError> {
        SocketReader::do_work(self)
    }

    fn is_fatal(&self, error: &ReaderError) -> bool {
        error.is_fatal()
    }
}

impl<K: FrameSink> Agent for SocketWriter<K> {
    type Error = WriterError;

    fn role_name(&self) -> &str {
        "socket-writer"
    }

    #[inline]
    fn do_work(&mut self) -> Result<usize, WriterError> {
        SocketWriter::do_work(self)
    }

    /// A failed write means the socket is gone; the reader notices and the
    /// supervisor reconnects, so the writer keeps running.
    fn is_fatal(&self, _error: &WriterError) -> bool {
        false
    }
}

/// Runs an [`Agent`] on a dedicated named thread.
///
/// Dropping the runner asks the agent to stop but does not wait for it.
#[derive(Debug)]
pub struct AgentRunner<E> {
    name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), E>>>,
}

impl<E: Send + 'static> AgentRunner<E> {
    /// Spawns the agent thread.
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start<A>(agent: A) -> io::Result<Self>
    where
        A: Agent<Error = E>,
    {
        let name = agent.role_name().to_string();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(agent, &flag))?;
        Ok(Self {
            name,
            running,
            handle: Some(handle),
        })
    }

    /// Agent name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the agent to stop after its current duty cycle.
    #[inline]
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// True once the agent thread has exited, either stopped or failed.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the agent and waits for its thread. Returns the fatal error that
    /// ended it, if any. A panic on the agent thread is resumed here.
    ///
    /// # Errors
    /// The agent's fatal error.
    pub fn join(mut self) -> Result<(), E> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            None => Ok(()),
        }
    }
}

impl<E> Drop for AgentRunner<E> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

fn run<A: Agent>(mut agent: A, running: &AtomicBool) -> Result<(), A::Error> {
    let name = agent.role_name().to_string();
    info!(agent = %name, "agent starting");

    if let Err(err) = agent.on_start() {
        error!(agent = %name, error = %err, "agent failed to start");
        agent.on_close();
        return Err(err);
    }

    let mut outcome = Ok(());
    while running.load(Ordering::Acquire) {
        match agent.do_work() {
            Ok(0) => thread::yield_now(),
            Ok(_) => {}
            Err(err) if agent.is_fatal(&err) => {
                error!(agent = %name, error = %err, "fatal agent error; stopping");
                outcome = Err(err);
                break;
            }
            Err(err) => warn!(agent = %name, error = %err, "agent duty cycle failed"),
        }
    }

    agent.on_close();
    info!(agent = %name, "agent stopped");
    outcome
}
