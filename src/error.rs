//! Errors reported by the bootloader trigger.

use thiserror::Error;

/// Convenience alias for results carrying the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A line-control signal could not be read from the endpoint. Transient.
    #[error("line control read failed: {0}")]
    LineControl(String),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No serial endpoint was configured and none could be discovered.
    #[error("no USB serial port found")]
    NotFound,

    /// The configured serial endpoint is not present on the system.
    #[error("serial port '{0}' is not ready")]
    NotReady(String),

    #[error("endpoint '{0}' is already registered")]
    DuplicateEndpoint(String),

    #[error("endpoint '{0}' is not registered")]
    UnknownEndpoint(String),

    /// The work queue mailbox is full; the event was not delivered.
    #[error("connection event mailbox is full")]
    MailboxFull,

    /// The work queue is no longer running.
    #[error("work queue has stopped")]
    QueueStopped,

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}
