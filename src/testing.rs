//! Test doubles for the line-control reader and the reboot primitive.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    error::{Error, Result},
    line_control::LineControl,
    trigger::RebootPrimitive,
};

/// What the host does with the line during one poll tick.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Sample {
    /// DTR asserted with the given baud rate.
    Open(u32),
    /// DTR deasserted.
    Closed,
    /// Reading DTR fails.
    DtrError,
    /// DTR asserted but reading the baud rate fails.
    BaudError,
}

#[derive(Debug, Default)]
struct Script {
    samples: VecDeque<Sample>,
    current: Option<Sample>,
    dtr_reads: usize,
}

/// A line whose samples are queued by the test, one per DTR read. When the
/// queue runs dry the last sample stays on the line.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedLine {
    script: Arc<Mutex<Script>>,
}
impl ScriptedLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: Sample) -> &Self {
        self.script.lock().unwrap().samples.push_back(sample);
        self
    }

    pub fn dtr_reads(&self) -> usize {
        self.script.lock().unwrap().dtr_reads
    }
}
impl LineControl for ScriptedLine {
    fn read_dtr(&mut self) -> Result<bool> {
        let mut script = self.script.lock().unwrap();
        script.dtr_reads += 1;
        if let Some(next) = script.samples.pop_front() {
            script.current = Some(next);
        }
        match script.current.unwrap_or(Sample::Closed) {
            Sample::DtrError => Err(Error::LineControl("scripted DTR failure".into())),
            Sample::Closed => Ok(false),
            Sample::Open(_) | Sample::BaudError => Ok(true),
        }
    }

    fn read_baud_rate(&mut self) -> Result<u32> {
        match self.script.lock().unwrap().current {
            Some(Sample::Open(baud_rate)) => Ok(baud_rate),
            _ => Err(Error::LineControl("scripted baud rate failure".into())),
        }
    }
}

/// Records every reboot request instead of rebooting.
#[derive(Debug, Default)]
pub(crate) struct RecordingReboot {
    codes: Mutex<Vec<u32>>,
}
impl RecordingReboot {
    pub fn codes(&self) -> Vec<u32> {
        self.codes.lock().unwrap().clone()
    }
}
impl RebootPrimitive for RecordingReboot {
    fn reboot(&self, mode_code: u32) {
        self.codes.lock().unwrap().push(mode_code);
    }
}

/// Poll until `cond` holds or about two seconds went by.
pub(crate) fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    cond()
}
