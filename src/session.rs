//! Line-state monitoring of one serial endpoint.
//!
//! **Example** - Driving a session by hand:
//! ```ignore
//! let mut session = Session::new("ttyACM0", endpoint, &settings, reboot);
//! session.on_connected(Instant::now());
//! // ... later, from the same thread
//! session.fire_if_due(Instant::now());
//! ```

mod events;
mod state_machine;
mod states;

pub use state_machine::{EndpointId, Session};
