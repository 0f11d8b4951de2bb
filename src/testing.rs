//! Host-side doubles for the platform seams.

use std::cell::Cell;
use std::convert::Infallible;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, InputPin};
use embedded_storage::{ReadStorage, Storage};

use crate::boot::{BootCommitError, BootSelector, PartitionHandle};
use crate::platform::{DelayOps, MonotonicClock, Restart};

pub(crate) const RESTART_PANIC: &str = "restart requested";

/// Clock whose time only moves when something delays on it.
#[derive(Debug, Default)]
pub(crate) struct SimClock {
    now_us: Cell<u64>,
}

impl SimClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance_ms(&self, millis: u64) {
        self.now_us.set(self.now_us.get() + millis * 1_000);
    }
}

impl MonotonicClock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1_000
    }
}

impl DelayOps for SimClock {
    fn delay_us(&self, micros: u32) {
        self.now_us.set(self.now_us.get() + u64::from(micros));
    }

    fn delay_ms(&self, millis: u32) {
        self.advance_ms(u64::from(millis));
    }
}

/// Active-low button that reads as pressed while the clock is in
/// `[pressed_from, pressed_until)`.
pub(crate) struct ScriptedButton<'a> {
    clock: &'a SimClock,
    pressed_from: u64,
    pressed_until: u64,
    reads: u32,
}

impl<'a> ScriptedButton<'a> {
    pub(crate) fn pressed_between(clock: &'a SimClock, from_ms: u64, until_ms: u64) -> Self {
        Self {
            clock,
            pressed_from: from_ms,
            pressed_until: until_ms,
            reads: 0,
        }
    }

    pub(crate) fn held_for(clock: &'a SimClock, millis: u64) -> Self {
        Self::pressed_between(clock, 0, millis)
    }

    pub(crate) fn never_pressed(clock: &'a SimClock) -> Self {
        Self::pressed_between(clock, 0, 0)
    }

    pub(crate) fn reads(&self) -> u32 {
        self.reads
    }

    fn pressed(&mut self) -> bool {
        self.reads += 1;
        let now = self.clock.now_ms();
        now >= self.pressed_from && now < self.pressed_until
    }
}

impl ErrorType for ScriptedButton<'_> {
    type Error = Infallible;
}

impl InputPin for ScriptedButton<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pressed())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pressed())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum MemFlashError {
    OutOfBounds,
    Injected,
}

/// NOR-ish flash image in RAM. Counts writes and can be told to fail.
#[derive(Debug)]
pub(crate) struct MemFlash {
    bytes: Vec<u8>,
    writes: u32,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemFlash {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
            writes: 0,
            fail_reads: false,
            fail_writes: false,
        }
    }

    pub(crate) fn writes(&self) -> u32 {
        self.writes
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub(crate) fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn span(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, MemFlashError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(MemFlashError::OutOfBounds)?;
        if end > self.bytes.len() {
            return Err(MemFlashError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl ReadStorage for MemFlash {
    type Error = MemFlashError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail_reads {
            return Err(MemFlashError::Injected);
        }
        let span = self.span(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[span]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for MemFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MemFlashError::Injected);
        }
        let span = self.span(offset, bytes.len())?;
        self.bytes[span].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedSelector {
    calls: Vec<PartitionHandle>,
    fail_with: Option<BootCommitError>,
}

impl ScriptedSelector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(error: BootCommitError) -> Self {
        Self {
            calls: Vec::new(),
            fail_with: Some(error),
        }
    }

    pub(crate) fn calls(&self) -> &[PartitionHandle] {
        &self.calls
    }
}

impl BootSelector for ScriptedSelector {
    fn set_next_boot(&mut self, target: &PartitionHandle) -> Result<(), BootCommitError> {
        self.calls.push(*target);
        match self.fail_with {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Unwinds instead of resetting so tests can observe the restart.
pub(crate) struct PanicRestart;

impl Restart for PanicRestart {
    fn restart(&mut self) -> ! {
        std::panic::panic_any(RESTART_PANIC)
    }
}
