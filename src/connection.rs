//! Connection lifecycle notifications of the USB link carrying a serial
//! endpoint.

/// Discrete notification delivered by a connection event source.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// State of the USB link as reported by a USB stack.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UsbConnState {
    /// No USB link.
    None,
    /// Bus power is present but the device has not been enumerated.
    Powered,
    /// The device is enumerated and its interfaces are usable.
    Hid,
}
impl UsbConnState {
    /// Maps a link state change onto the event the bootloader trigger reacts
    /// to. Bus power alone does not make the serial port usable and is not an
    /// event.
    pub fn event(self) -> Option<ConnectionEvent> {
        match self {
            UsbConnState::Hid => Some(ConnectionEvent::Connected),
            UsbConnState::None => Some(ConnectionEvent::Disconnected),
            UsbConnState::Powered => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powered_only_is_not_an_event() {
        assert_eq!(UsbConnState::Powered.event(), None);
    }

    #[test]
    fn enumerated_and_unplugged_map_to_events() {
        assert_eq!(UsbConnState::Hid.event(), Some(ConnectionEvent::Connected));
        assert_eq!(
            UsbConnState::None.event(),
            Some(ConnectionEvent::Disconnected)
        );
    }
}
