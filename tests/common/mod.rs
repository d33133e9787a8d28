//! Shared test infrastructure for panel-io integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use panel_io::{ButtonEvent, ButtonId, Direction, EncoderId, TimeDuration, TimeInstant, TimeSource};

// ============================================================================
// Mock Time Types
// ============================================================================

/// Mock duration type for testing (wraps milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis)
    }

    fn saturating_sub(self, other: Self) -> Self {
        TestDuration(self.0.saturating_sub(other.0))
    }
}

/// Mock instant type for testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0 - earlier.0)
    }

    fn checked_add(self, duration: Self::Duration) -> Option<Self> {
        Some(TestInstant(self.0 + duration.0))
    }
}

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock time source with controllable time advancement
pub struct MockTimeSource {
    current_time: Cell<TestInstant>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            current_time: Cell::new(TestInstant(0)),
        }
    }

    /// Advance time by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        let current = self.current_time.get();
        self.current_time.set(TestInstant(current.0 + millis));
    }

    pub fn set_time(&self, millis: u64) {
        self.current_time.set(TestInstant(millis));
    }

    pub fn millis(&self) -> u64 {
        self.current_time.get().0
    }
}

impl TimeSource<TestInstant> for MockTimeSource {
    fn now(&self) -> TestInstant {
        self.current_time.get()
    }
}

// ============================================================================
// Mock Lines
// ============================================================================

/// Input line whose level the test controls through a shared handle.
///
/// Clone it before handing it to the code under test; both clones see the
/// same level. A level of `None` makes every read fail.
#[derive(Clone)]
pub struct MockLine {
    level: Rc<Cell<Option<bool>>>,
    reads: Rc<Cell<usize>>,
}

impl MockLine {
    pub fn new(high: bool) -> Self {
        Self {
            level: Rc::new(Cell::new(Some(high))),
            reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn broken() -> Self {
        Self {
            level: Rc::new(Cell::new(None)),
            reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn set_high(&self) {
        self.level.set(Some(true));
    }

    pub fn set_low(&self) {
        self.level.set(Some(false));
    }

    pub fn set(&self, high: bool) {
        self.level.set(Some(high));
    }

    /// Makes every following read fail.
    pub fn set_broken(&self) {
        self.level.set(None);
    }

    /// Number of reads performed so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl ErrorType for MockLine {
    type Error = ErrorKind;
}

impl InputPin for MockLine {
    fn is_high(&mut self) -> Result<bool, ErrorKind> {
        self.reads.set(self.reads.get() + 1);
        self.level.get().ok_or(ErrorKind::Other)
    }

    fn is_low(&mut self) -> Result<bool, ErrorKind> {
        self.is_high().map(|high| !high)
    }
}

/// Output line that records every write with the time it happened.
pub struct MockBuzzer<'t> {
    time: &'t MockTimeSource,
    writes: Rc<RefCell<Vec<(u64, bool)>>>,
}

impl<'t> MockBuzzer<'t> {
    pub fn new(time: &'t MockTimeSource) -> (Self, Rc<RefCell<Vec<(u64, bool)>>>) {
        let writes = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                time,
                writes: writes.clone(),
            },
            writes,
        )
    }
}

impl ErrorType for MockBuzzer<'_> {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockBuzzer<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push((self.time.millis(), false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push((self.time.millis(), true));
        Ok(())
    }
}

/// Finds whether any two write sequences overlap: true if the line was ever
/// driven high twice without a low in between.
pub fn has_double_high(writes: &[(u64, bool)]) -> bool {
    writes.windows(2).any(|w| w[0].1 && w[1].1)
}

// ============================================================================
// Event Recorders
// ============================================================================

pub type ButtonLog = Rc<RefCell<Vec<(u64, ButtonId, ButtonEvent)>>>;

/// Observer context recording button events with a timestamp.
#[derive(Clone)]
pub struct ButtonRecorder {
    pub time: Rc<MockTimeSource>,
    pub log: ButtonLog,
}

pub fn record_button(id: ButtonId, event: ButtonEvent, recorder: &ButtonRecorder) {
    recorder
        .log
        .borrow_mut()
        .push((recorder.time.millis(), id, event));
}

pub type DirectionLog = Rc<RefCell<Vec<(EncoderId, Direction)>>>;

pub fn record_direction(id: EncoderId, direction: Direction, log: &DirectionLog) {
    log.borrow_mut().push((id, direction));
}
