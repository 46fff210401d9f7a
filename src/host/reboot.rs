//! Process-level reboot primitive.

use log::{info, warn};

use crate::trigger::RebootPrimitive;

/// Largest mode code that survives as a process exit status.
pub const MAX_EXIT_CODE: u32 = 255;

/// Reboot primitive for a host process: terminates the process with the mode
/// code as exit status. Restarting the device in update mode is left to
/// whatever supervises the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitReboot;

impl RebootPrimitive for ExitReboot {
    fn reboot(&self, mode_code: u32) {
        let status = exit_status(mode_code);
        info!("exiting with status {:#04x}", status);
        log::logger().flush();
        std::process::exit(status);
    }
}

/// Only the low 8 bits of an exit status reach the parent, so a code that
/// does not fit is reported as `MAX_EXIT_CODE` rather than truncated (which
/// could read as a clean exit).
fn exit_status(mode_code: u32) -> i32 {
    if mode_code > MAX_EXIT_CODE {
        warn!(
            "mode {:#x} does not fit an exit status, using {:#04x}",
            mode_code, MAX_EXIT_CODE
        );
        MAX_EXIT_CODE as i32
    } else {
        mode_code as i32
    }
}

#[test]
fn small_codes_are_kept() {
    assert_eq!(exit_status(0x57), 0x57);
    assert_eq!(exit_status(255), 255);
}

#[test]
fn wide_codes_never_become_zero() {
    assert_eq!(exit_status(0x100), 255);
    assert_eq!(exit_status(0x1_0057), 255);
}
