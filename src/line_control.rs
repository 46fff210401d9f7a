//! Read access to the line-control signals of a serial endpoint.

use crate::error::Result;

/// Synchronous access to the line-control state of one serial endpoint, as
/// configured by the host on the other side of the USB link.
///
/// Reads may fail transiently (e.g. while the USB stack is re-enumerating);
/// callers treat a failure as "nothing new this time" and simply try again on
/// the next poll.
pub trait LineControl: Send {
    /// Whether the host currently asserts DTR, i.e. holds the port open.
    fn read_dtr(&mut self) -> Result<bool>;

    /// The baud rate the host configured on the port.
    fn read_baud_rate(&mut self) -> Result<u32>;
}
