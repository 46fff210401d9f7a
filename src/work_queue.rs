//! The serialized execution context of the bootloader trigger.
//!
//! One thread owns the [`Registry`] and runs, one at a time, every connection
//! event and every poll tick. Sessions therefore never need locking, and all
//! operations on a session are totally ordered.
//!
//! Connection event sources do not touch the registry. They post events to a
//! bounded mailbox through an [`EventSender`], which never blocks: a full
//! mailbox is reported back to the event source instead.
//!
//! ```text
//!   PortWatcher / USB stack                 work queue thread
//!  .------------------------.  mailbox   .----------------------------.
//!  | EventSender::connected |----------->| Registry::dispatch         |
//!  | EventSender::disconn.. |  (bounded) | Registry::poll_due (timer) |
//!  '------------------------'            '----------------------------'
//! ```

use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError},
    thread::{self, JoinHandle},
    time::Instant,
};

use log::{debug, warn};

use crate::{
    connection::{ConnectionEvent, UsbConnState},
    error::{Error, Result},
    registry::Registry,
    session::EndpointId,
};

// =============================================================================
// Public Interface
// =============================================================================

/// Handle to a running work queue.
pub struct WorkQueue {
    sender: EventSender,
    handle: JoinHandle<Registry>,
}

impl WorkQueue {
    /// Move `registry` onto a new work queue thread with a mailbox of
    /// `capacity` events.
    pub fn start(registry: Registry, capacity: usize) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let handle = thread::Builder::new()
            .name("work-queue".into())
            .spawn(move || run(registry, rx))?;
        Ok(WorkQueue {
            sender: EventSender { tx },
            handle,
        })
    }

    /// A new handle for posting connection events to this queue.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Stop the queue once the events already in the mailbox are processed and
    /// hand back the registry.
    pub fn shutdown(self) -> Result<Registry> {
        self.sender
            .tx
            .send(Command::Shutdown)
            .map_err(|_| Error::QueueStopped)?;
        self.join()
    }

    /// Wait for the queue to stop by itself, which happens once every
    /// [`EventSender`] is dropped.
    pub fn join(self) -> Result<Registry> {
        let WorkQueue { sender, handle } = self;
        drop(sender);
        handle.join().map_err(|_| Error::QueueStopped)
    }
}

/// Posts connection events to a [`WorkQueue`]. Cheap to clone; every event
/// source gets its own.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: SyncSender<Command>,
}

impl EventSender {
    pub fn send(&self, id: &str, event: ConnectionEvent) -> Result<()> {
        self.tx
            .try_send(Command::Event {
                id: id.to_owned(),
                event,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => {
                    warn!("[{}] mailbox full, {:?} not delivered", id, event);
                    Error::MailboxFull
                }
                TrySendError::Disconnected(_) => Error::QueueStopped,
            })
    }

    pub fn connected(&self, id: &str) -> Result<()> {
        self.send(id, ConnectionEvent::Connected)
    }

    pub fn disconnected(&self, id: &str) -> Result<()> {
        self.send(id, ConnectionEvent::Disconnected)
    }

    /// Post the event corresponding to a USB link state change, if any.
    pub fn conn_state(&self, id: &str, state: UsbConnState) -> Result<()> {
        match state.event() {
            Some(event) => self.send(id, event),
            None => {
                debug!("[{}] ignoring USB state {:?}", id, state);
                Ok(())
            }
        }
    }
}

// =============================================================================
// Private stuff
// =============================================================================

#[derive(Debug)]
enum Command {
    Event {
        id: EndpointId,
        event: ConnectionEvent,
    },
    Shutdown,
}

/// The work queue event loop. Fires the due poll ticks, then sleeps on the
/// mailbox until the next tick is due or an event arrives.
fn run(mut registry: Registry, rx: Receiver<Command>) -> Registry {
    loop {
        registry.poll_due(Instant::now());

        let received = match registry.next_deadline() {
            Some(deadline) => {
                rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Event { id, event }) => {
                // Unknown endpoints are already reported by the registry.
                let _ = registry.dispatch(&id, event, Instant::now());
            }
            Ok(Command::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("work queue stopped");
    registry
}

// =============================================================================
// Unit Tests
// =============================================================================
