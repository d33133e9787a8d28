//! Buzzer sequencer with state management and timing control.
//!
//! Provides [`BuzzerSequencer`], which owns the buzzer output line and renders
//! [`Note`] pulse trains requested through a [`PlaybackChannel`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{OutputPin, PinState};

use crate::command::{PlaybackChannel, PlaybackCommand};
use crate::time::{ServiceTiming, TimeDuration, TimeInstant, TimeSource, deadline_after, remaining};
use crate::types::Note;

/// Half-cycle of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Output high.
    On,
    /// Output low.
    Off,
}

/// The current state of a buzzer sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerState {
    /// Nothing rendering. Output is low.
    Idle,
    /// Rendering a note.
    Playing {
        /// Cycles left, including the current one.
        remaining: u32,
        phase: Phase,
    },
}

/// Renders notes on a single output line.
///
/// The sequencer owns the line exclusively; producers only reach it through the
/// [`PlaybackChannel`]. Every [`service`](Self::service) call first checks the
/// mailbox, so a stop or a new note takes effect at the next half-cycle
/// boundary or sooner.
///
/// # Type Parameters
/// * `'a` - Lifetime of the time source and channel references
/// * `I` - Time instant type
/// * `P` - Output line type
/// * `T` - Time source implementation type
/// * `M` - Raw mutex guarding the channel
pub struct BuzzerSequencer<'a, I: TimeInstant, P: OutputPin, T: TimeSource<I>, M: RawMutex> {
    output: P,
    time_source: &'a T,
    channel: &'a PlaybackChannel<M, I::Duration>,
    state: SequencerState,
    note: Option<Note<I::Duration>>,
    phase_end: Option<I>,
    level: bool,
}

impl<'a, I: TimeInstant, P: OutputPin, T: TimeSource<I>, M: RawMutex> BuzzerSequencer<'a, I, P, T, M> {
    /// Creates an idle sequencer with the output driven low.
    pub fn new(mut output: P, time_source: &'a T, channel: &'a PlaybackChannel<M, I::Duration>) -> Self {
        let _ = output.set_low();
        channel.set_playing(false);

        Self {
            output,
            time_source,
            channel,
            state: SequencerState::Idle,
            note: None,
            phase_end: None,
            level: false,
        }
    }

    /// Applies a pending command, then advances any half-cycles that are due.
    ///
    /// Half-cycles that ended before now are skipped without touching the
    /// line; only the level of the half-cycle containing now is driven, so a
    /// late call never replays missed pulses.
    ///
    /// # Returns
    /// - `ServiceTiming::Delay(d)` - A note is rendering; call again after `d`
    /// - `ServiceTiming::Idle` - Nothing rendering; wait for a command
    pub fn service(&mut self) -> ServiceTiming<I::Duration> {
        if let Some(command) = self.channel.try_take() {
            self.handle_command(command);
        }

        let now = self.time_source.now();
        while let (SequencerState::Playing { .. }, Some(end)) = (self.state, self.phase_end) {
            if end > now {
                self.drive();
                return ServiceTiming::Delay(remaining(now, end));
            }
            self.advance(end);
        }

        ServiceTiming::Idle
    }

    /// Applies a command: stop whatever is rendering, then start the new note if any.
    ///
    /// Returns the timing of the new state without advancing it.
    pub fn handle_command(&mut self, command: PlaybackCommand<I::Duration>) -> ServiceTiming<I::Duration> {
        // The busy flag is left alone here: a stop racing with a new note
        // must keep seeing the channel as playing.
        self.silence();

        match command {
            PlaybackCommand::Stop => {
                self.channel.set_playing(false);
                ServiceTiming::Idle
            }
            PlaybackCommand::Play(note) => self.begin(note),
        }
    }

    /// Current state.
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Returns true if a note is rendering.
    pub fn is_playing(&self) -> bool {
        matches!(self.state, SequencerState::Playing { .. })
    }

    /// Level last written to the output line.
    pub fn output_level(&self) -> bool {
        self.level
    }

    /// The note being rendered, if any.
    pub fn current_note(&self) -> Option<&Note<I::Duration>> {
        self.note.as_ref()
    }

    fn begin(&mut self, note: Note<I::Duration>) -> ServiceTiming<I::Duration> {
        if note.is_silent() {
            self.channel.set_playing(false);
            return ServiceTiming::Idle;
        }

        debug!("buzzer: playing {} cycles", note.repeat);
        self.note = Some(note);
        self.channel.set_playing(true);

        let now = self.time_source.now();
        self.enter(Phase::On, note.repeat, now);
        self.drive();
        match self.phase_end {
            Some(end) => ServiceTiming::Delay(remaining(now, end)),
            None => ServiceTiming::Idle,
        }
    }

    /// Starts a half-cycle at `start`. The line is driven separately.
    fn enter(&mut self, phase: Phase, remaining: u32, start: I) {
        let Some(note) = self.note else {
            return;
        };

        let duration = match phase {
            Phase::On => note.on,
            Phase::Off => note.off,
        };

        self.state = SequencerState::Playing { remaining, phase };
        self.phase_end = Some(deadline_after(start, duration));
    }

    /// Moves past the half-cycle that ended at `end`.
    fn advance(&mut self, end: I) {
        let SequencerState::Playing { remaining, phase } = self.state else {
            return;
        };

        match phase {
            Phase::On => self.enter(Phase::Off, remaining, end),
            Phase::Off if remaining > 1 => self.enter(Phase::On, remaining - 1, end),
            Phase::Off => {
                debug!("buzzer: note complete");
                self.halt();
            }
        }
    }

    /// Writes the level of the current half-cycle if the line is not already there.
    fn drive(&mut self) {
        let high = match (self.state, self.note) {
            // A zero-length high phase never drives the line.
            (SequencerState::Playing { phase: Phase::On, .. }, Some(note)) => note.on != I::Duration::ZERO,
            _ => false,
        };
        if high != self.level {
            self.write(high);
        }
    }

    /// Forces the line low and returns to `Idle`.
    fn silence(&mut self) {
        if self.is_playing() {
            debug!("buzzer: stopped");
        }
        self.write(false);
        self.state = SequencerState::Idle;
        self.note = None;
        self.phase_end = None;
    }

    /// Ends playback: line low, `Idle`, channel no longer busy.
    fn halt(&mut self) {
        self.silence();
        self.channel.set_playing(false);
    }

    fn write(&mut self, high: bool) {
        // Output errors cannot be reported to anyone useful; the next write retries.
        let _ = self.output.set_state(PinState::from(high));
        self.level = high;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal::digital::ErrorType;
    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestDuration(u64);

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

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestInstant(u64);

    impl TimeInstant for TestInstant {
        type Duration = TestDuration;

        fn duration_since(&self, earlier: Self) -> Self::Duration {
            TestDuration(self.0 - earlier.0)
        }

        fn checked_add(self, duration: Self::Duration) -> Option<Self> {
            Some(TestInstant(self.0 + duration.0))
        }
    }

    struct MockTime(Cell<u64>);

    impl TimeSource<TestInstant> for MockTime {
        fn now(&self) -> TestInstant {
            TestInstant(self.0.get())
        }
    }

    impl MockTime {
        fn advance(&self, millis: u64) {
            self.0.set(self.0.get() + millis);
        }
    }

    // Records (time, level) for every write.
    struct MockBuzzer<'t> {
        time: &'t MockTime,
        writes: Vec<(u64, bool), 64>,
    }

    impl ErrorType for MockBuzzer<'_> {
        type Error = Infallible;
    }

    impl OutputPin for MockBuzzer<'_> {
        fn set_low(&mut self) -> Result<(), Infallible> {
            let _ = self.writes.push((self.time.0.get(), false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            let _ = self.writes.push((self.time.0.get(), true));
            Ok(())
        }
    }

    type Channel = PlaybackChannel<NoopRawMutex, TestDuration>;

    fn note(on: u64, off: u64, repeat: u32) -> Note<TestDuration> {
        Note::new(TestDuration(on), TestDuration(off), repeat)
    }

    #[test]
    fn new_drives_output_low() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let seq = BuzzerSequencer::new(buzzer, &time, &channel);

        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(!seq.output_level());
        assert_eq!(seq.output.writes.as_slice(), &[(0, false)]);
    }

    #[test]
    fn renders_full_pattern() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let mut seq = BuzzerSequencer::new(buzzer, &time, &channel);

        channel.play(note(100, 50, 2));
        assert_eq!(seq.service(), ServiceTiming::Delay(TestDuration(100)));
        assert!(channel.is_playing());
        assert_eq!(
            seq.state(),
            SequencerState::Playing { remaining: 2, phase: Phase::On }
        );

        time.advance(100);
        assert_eq!(seq.service(), ServiceTiming::Delay(TestDuration(50)));
        time.advance(50);
        assert_eq!(seq.service(), ServiceTiming::Delay(TestDuration(100)));
        assert_eq!(
            seq.state(),
            SequencerState::Playing { remaining: 1, phase: Phase::On }
        );
        time.advance(100);
        assert_eq!(seq.service(), ServiceTiming::Delay(TestDuration(50)));
        time.advance(50);
        assert_eq!(seq.service(), ServiceTiming::Idle);

        assert!(!channel.is_playing());
        // Construction and the implicit stop both force the line low first.
        assert_eq!(
            seq.output.writes.as_slice(),
            &[
                (0, false),
                (0, false),
                (0, true),
                (100, false),
                (150, true),
                (250, false),
                (300, false)
            ]
        );
    }

    #[test]
    fn late_service_catches_up_on_schedule() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let mut seq = BuzzerSequencer::new(buzzer, &time, &channel);

        channel.play(note(100, 50, 3));
        seq.service();
        time.advance(170);
        // 0..100 on, 100..150 off, 150..250 on: 80ms left.
        assert_eq!(seq.service(), ServiceTiming::Delay(TestDuration(80)));
        assert_eq!(
            seq.state(),
            SequencerState::Playing { remaining: 2, phase: Phase::On }
        );
        // The missed off phase is skipped; the line was already high.
        assert_eq!(seq.output.writes.last(), Some(&(0, true)));
    }

    #[test]
    fn zero_on_duration_never_drives_high() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let mut seq = BuzzerSequencer::new(buzzer, &time, &channel);

        channel.play(note(0, 40, 2));
        assert_eq!(seq.service(), ServiceTiming::Delay(TestDuration(40)));
        time.advance(80);
        assert_eq!(seq.service(), ServiceTiming::Idle);
        assert!(seq.output.writes.iter().all(|&(_, level)| !level));
    }

    #[test]
    fn zero_off_duration_holds_line_high() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let mut seq = BuzzerSequencer::new(buzzer, &time, &channel);

        channel.play(note(30, 0, 3));
        seq.service();
        time.advance(90);
        assert_eq!(seq.service(), ServiceTiming::Idle);

        let lows: Vec<u64, 8> = seq
            .output
            .writes
            .iter()
            .filter(|&&(_, level)| !level)
            .map(|&(t, _)| t)
            .collect();
        assert_eq!(lows.as_slice(), &[0, 0, 90]);
    }

    #[test]
    fn silent_note_stays_idle() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let mut seq = BuzzerSequencer::new(buzzer, &time, &channel);

        channel.play(note(100, 50, 0));
        assert_eq!(seq.service(), ServiceTiming::Idle);
        assert!(!channel.is_playing());

        channel.play(note(0, 0, 10));
        assert_eq!(seq.service(), ServiceTiming::Idle);
        assert!(!seq.is_playing());
    }

    #[test]
    fn handle_command_applies_directly() {
        let time = MockTime(Cell::new(0));
        let channel = Channel::new();
        let buzzer = MockBuzzer { time: &time, writes: Vec::new() };
        let mut seq = BuzzerSequencer::new(buzzer, &time, &channel);

        let timing = seq.handle_command(PlaybackCommand::Play(note(30, 30, 1)));
        assert_eq!(timing, ServiceTiming::Delay(TestDuration(30)));
        assert!(seq.output_level());

        assert_eq!(seq.handle_command(PlaybackCommand::Stop), ServiceTiming::Idle);
        assert!(!seq.output_level());
        assert!(!channel.is_playing());
    }
}
